// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The entity manager: registry, archetype table, and the single point
//! through which structural mutations are applied.

use rustc_hash::FxHashMap;

use crate::archetype::{Archetype, ArchetypeId, ArchetypePool};
use crate::component::{ComponentInfo, ComponentKind, ComponentRegistry};
use crate::config::WorldConfig;
use crate::entity::{Entity, EntityRegistry};
use crate::error::{EcsError, Result};
use crate::prototype::{PrototypeBuilder, PrototypeId, PrototypeTable};
use crate::signature::Signature;

/// Owns every entity, archetype pool, and prototype in a session.
pub struct World {
    registry: ComponentRegistry,
    entities: EntityRegistry,
    archetypes: Vec<Archetype>,
    pools: Vec<ArchetypePool>,
    archetype_index: FxHashMap<Signature, ArchetypeId>,
    prototypes: PrototypeTable,
    config: WorldConfig,
    locked: bool,
}

impl World {
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    pub fn with_config(config: WorldConfig) -> Self {
        let mut world = World {
            registry: ComponentRegistry::new(),
            entities: EntityRegistry::with_capacity(config.max_entities as usize),
            archetypes: Vec::new(),
            pools: Vec::new(),
            archetype_index: FxHashMap::default(),
            prototypes: PrototypeTable::new(),
            config,
            locked: false,
        };
        let empty = world.get_or_create_archetype(Signature::empty());
        debug_assert_eq!(empty, ArchetypeId::EMPTY);
        world
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn register_component(&mut self, info: ComponentInfo) -> ComponentKind {
        self.registry.register(info)
    }

    pub fn register_prototype(&mut self, builder: PrototypeBuilder) -> PrototypeId {
        self.prototypes.register(builder)
    }

    pub fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    pub fn pools(&self) -> &[ArchetypePool] {
        &self.pools
    }

    pub fn pools_mut(&mut self) -> &mut [ArchetypePool] {
        &mut self.pools
    }

    /// Structural mutations are rerouted into a job's own command buffer
    /// while this is `true`; the scheduler sets/clears it around job waves.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    fn ensure_unlocked(&self) -> Result<()> {
        if self.locked {
            tracing::warn!("structural mutation attempted on a locked world; route it through a command buffer");
            return Err(EcsError::WorldLocked);
        }
        Ok(())
    }

    /// Look up a live entity's data for a mutator, logging (rather than
    /// silently failing) when the reference is stale.
    fn require_live(&self, entity: Entity) -> Result<crate::entity::EntityData> {
        self.entities.get(entity).copied().ok_or_else(|| {
            tracing::warn!(id = entity.id, version = entity.version, "stale entity reference; mutator is a no-op");
            EcsError::StaleEntity
        })
    }

    pub fn entity_signature(&self, entity: Entity) -> Option<Signature> {
        self.entities.get(entity).map(|d| d.signature)
    }

    pub fn is_valid(&self, entity: Entity) -> bool {
        self.entities.is_valid(entity)
    }

    pub fn has(&self, entity: Entity, kind: ComponentKind) -> bool {
        match self.entities.get(entity) {
            Some(data) if data.signature.contains(kind) => true,
            Some(data) if data.prototype_id >= 0 => self
                .prototypes
                .get(data.prototype_id)
                .map(|p| p.signature.contains(kind))
                .unwrap_or(false),
            _ => false,
        }
    }

    fn get_or_create_archetype(&mut self, signature: Signature) -> ArchetypeId {
        if let Some(&id) = self.archetype_index.get(&signature) {
            return id;
        }
        let id = ArchetypeId(self.archetypes.len() as u32);
        let archetype = Archetype::new(id, signature);
        let pool = ArchetypePool::new(&archetype, &self.registry, self.config.initial_pool_capacity);
        tracing::debug!(archetype = id.0, components = archetype.components.len(), "created archetype");
        self.archetypes.push(archetype);
        self.pools.push(pool);
        self.archetype_index.insert(signature, id);
        id
    }

    fn split_pools_mut(pools: &mut [ArchetypePool], a: usize, b: usize) -> (&mut ArchetypePool, &mut ArchetypePool) {
        debug_assert_ne!(a, b);
        if a < b {
            let (left, right) = pools.split_at_mut(b);
            (&mut left[a], &mut right[0])
        } else {
            let (left, right) = pools.split_at_mut(a);
            (&mut right[0], &mut left[b])
        }
    }

    /// Move `entity` to the archetype for `new_signature`, copying every
    /// shared component and destroying every component being dropped. A
    /// no-op if `new_signature` matches the entity's current signature.
    fn migrate(&mut self, entity: Entity, new_signature: Signature) -> Result<()> {
        let data = *self.entities.get(entity).ok_or(EcsError::StaleEntity)?;
        if data.signature == new_signature {
            return Ok(());
        }
        let old_idx = data.archetype.index();
        let old_row = data.pool_index as usize;

        for kind in data.signature.difference(new_signature).iter() {
            self.pools[old_idx].destroy_component(kind, old_row, &self.registry);
        }

        let new_archetype_id = self.get_or_create_archetype(new_signature);
        let new_idx = new_archetype_id.index();

        let (old_pool, new_pool) = Self::split_pools_mut(&mut self.pools, old_idx, new_idx);
        let new_row = new_pool.push_back(entity);
        for kind in data.signature.intersection(new_signature).iter() {
            if let (Some(src), Some(dst)) =
                (old_pool.component_ptr(kind, old_row), new_pool.component_ptr_mut(kind, new_row))
            {
                let size = self.registry.size(kind);
                unsafe {
                    std::ptr::copy_nonoverlapping(src, dst, size);
                }
            }
        }
        if let Some(moved) = old_pool.remove(old_row) {
            self.entities.data_for_id_mut(moved.id).pool_index = old_row as u32;
        }

        let ed = self.entities.data_for_id_mut(entity.id);
        ed.signature = new_signature;
        ed.archetype = new_archetype_id;
        ed.pool_index = new_row as u32;
        Ok(())
    }

    pub fn create_entity(&mut self, prototype_id: PrototypeId) -> Result<Entity> {
        self.ensure_unlocked()?;
        let entity = self.entities.allocate(self.config.max_entities).ok_or_else(|| {
            tracing::error!("entity id space exhausted at {} entities", self.config.max_entities);
            EcsError::EntitySpaceExhausted
        })?;
        let row = self.pools[ArchetypeId::EMPTY.index()].push_back(entity);
        let data = self.entities.data_for_id_mut(entity.id);
        data.archetype = ArchetypeId::EMPTY;
        data.pool_index = row as u32;
        data.prototype_id = prototype_id;
        Ok(entity)
    }

    pub fn delete_entity(&mut self, entity: Entity) -> Result<()> {
        self.ensure_unlocked()?;
        let data = self.require_live(entity)?;
        let idx = data.archetype.index();
        let row = data.pool_index as usize;
        for kind in data.signature.iter() {
            self.pools[idx].destroy_component(kind, row, &self.registry);
        }
        if let Some(moved) = self.pools[idx].remove(row) {
            self.entities.data_for_id_mut(moved.id).pool_index = row as u32;
        }
        self.entities.retire(entity.id);
        Ok(())
    }

    /// Add `kind` to `entity`'s signature, optionally writing `value` into
    /// the new column. If the entity already carries `kind`, this overwrites
    /// the existing value (if given) without moving the entity.
    pub fn add_component(&mut self, entity: Entity, kind: ComponentKind, value: Option<&[u8]>) -> Result<*mut u8> {
        self.ensure_unlocked()?;
        if kind.index() >= self.registry.kind_count() {
            return Err(EcsError::UnknownComponent);
        }
        if self.registry.is_prototype_only(kind) {
            return Err(EcsError::PrototypeWrite);
        }
        let data = self.require_live(entity)?;

        if !data.signature.contains(kind) {
            self.migrate(entity, data.signature.with(kind))?;
        }
        let data = *self.entities.get(entity).ok_or(EcsError::StaleEntity)?;
        let ptr = self.pools[data.archetype.index()]
            .component_ptr_mut(kind, data.pool_index as usize)
            .ok_or(EcsError::UnknownComponent)?;
        if let Some(v) = value {
            unsafe {
                std::ptr::copy_nonoverlapping(v.as_ptr(), ptr, v.len());
            }
        }
        Ok(ptr)
    }

    pub fn set_component(&mut self, entity: Entity, kind: ComponentKind, value: &[u8]) -> Result<()> {
        self.add_component(entity, kind, Some(value)).map(|_| ())
    }

    /// Add every kind in `signature` to `entity` at once. Component values
    /// are left uninitialized; set them afterward with [`Self::set_component`].
    pub fn add_signature(&mut self, entity: Entity, signature: Signature) -> Result<()> {
        self.ensure_unlocked()?;
        let data = self.require_live(entity)?;
        for kind in signature.difference(data.signature).iter() {
            if kind.index() >= self.registry.kind_count() {
                return Err(EcsError::UnknownComponent);
            }
            if self.registry.is_prototype_only(kind) {
                return Err(EcsError::PrototypeWrite);
            }
        }
        self.migrate(entity, data.signature.union(signature))
    }

    pub fn remove_component(&mut self, entity: Entity, kind: ComponentKind) -> Result<()> {
        self.ensure_unlocked()?;
        if kind.index() >= self.registry.kind_count() {
            return Err(EcsError::UnknownComponent);
        }
        let data = self.require_live(entity)?;
        if !data.signature.contains(kind) {
            return Ok(());
        }
        self.migrate(entity, data.signature.difference(Signature::single(kind)))
    }

    /// Read a component's value, falling back to the entity's prototype if
    /// its archetype does not carry `kind`.
    pub fn get_component(&self, entity: Entity, kind: ComponentKind) -> Option<*const u8> {
        let data = self.entities.get(entity)?;
        if data.signature.contains(kind) {
            self.pools[data.archetype.index()].component_ptr(kind, data.pool_index as usize)
        } else if data.prototype_id >= 0 {
            self.prototypes.get(data.prototype_id)?.component_ptr(kind)
        } else {
            None
        }
    }

    /// Mutable access; fails for components only available through the
    /// prototype fallback, since those are read-only by definition.
    pub fn get_component_mut(&mut self, entity: Entity, kind: ComponentKind) -> Result<*mut u8> {
        let data = *self.entities.get(entity).ok_or(EcsError::StaleEntity)?;
        if data.signature.contains(kind) {
            self.pools[data.archetype.index()]
                .component_ptr_mut(kind, data.pool_index as usize)
                .ok_or(EcsError::UnknownComponent)
        } else if self.registry.is_prototype_only(kind) {
            Err(EcsError::PrototypeWrite)
        } else {
            Err(EcsError::UnknownComponent)
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for World {
    fn drop(&mut self) {
        for pool in &mut self.pools {
            pool.destroy_all(&self.registry);
        }
    }
}
