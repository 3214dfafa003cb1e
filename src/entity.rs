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

//! Entity identifiers and the dense sparse-set table that backs them.

use crate::archetype::ArchetypeId;
use crate::signature::Signature;

/// Default cap on the number of simultaneously live entities. Also the
/// boundary below which an [`Entity::id`] is real; ids above this are
/// placeholders minted by a command buffer.
pub const MAX_ENTITIES: u32 = 64_000;

/// A 64-bit generational reference to a world object: a 32-bit id paired
/// with a 32-bit version. `version == 0` denotes the null entity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Entity {
    pub id: u32,
    pub version: u32,
}

impl Entity {
    pub const NULL: Entity = Entity { id: 0, version: 0 };

    pub fn is_null(&self) -> bool {
        self.version == 0
    }

    /// Entity ids above `MAX_ENTITIES` are placeholders minted by a
    /// [`CommandBuffer`](crate::command::CommandBuffer), not real entities.
    pub fn is_placeholder(&self) -> bool {
        self.id > MAX_ENTITIES
    }
}

/// Per-entity bookkeeping stored in the dense table, keyed by entity id.
#[derive(Clone, Copy, Debug)]
pub struct EntityData {
    pub version: u32,
    pub signature: Signature,
    pub archetype: ArchetypeId,
    pub pool_index: u32,
    pub prototype_id: i32,
}

impl EntityData {
    const NONE_POOL_INDEX: u32 = u32::MAX;

    fn vacant(version: u32) -> Self {
        EntityData {
            version,
            signature: Signature::empty(),
            archetype: ArchetypeId::EMPTY,
            pool_index: Self::NONE_POOL_INDEX,
            prototype_id: -1,
        }
    }
}

/// Dense sparse-set table mapping entity id to [`EntityData`], with a free
/// list for id reuse.
///
/// `sparse[id]` holds `id`'s slot in `dense` directly: unlike a classic
/// sparse set this table never compacts `dense`, since an entity's id must
/// stay stable for its whole lifetime (other entities reference it by id).
pub struct EntityRegistry {
    dense: Vec<EntityData>,
    free: Vec<u32>,
    retired: Vec<bool>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        EntityRegistry { dense: Vec::new(), free: Vec::new(), retired: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        EntityRegistry {
            dense: Vec::with_capacity(cap),
            free: Vec::with_capacity(cap),
            retired: Vec::with_capacity(cap),
        }
    }

    /// Allocate a fresh entity id with version 1, or reuse a freed id with
    /// its version incremented. Returns `None` if the id space is exhausted.
    pub fn allocate(&mut self, max_entities: u32) -> Option<Entity> {
        while let Some(id) = self.free.pop() {
            if self.retired[id as usize] {
                continue;
            }
            let data = &mut self.dense[id as usize];
            return Some(Entity { id, version: data.version });
        }
        if (self.dense.len() as u32) >= max_entities {
            return None;
        }
        let id = self.dense.len() as u32;
        self.dense.push(EntityData::vacant(1));
        self.retired.push(false);
        Some(Entity { id, version: 1 })
    }

    /// Returns the entity's data iff `entity` still matches the registry's
    /// current version for that id (i.e. is not stale).
    pub fn get(&self, entity: Entity) -> Option<&EntityData> {
        if entity.is_null() || entity.is_placeholder() {
            return None;
        }
        let data = self.dense.get(entity.id as usize)?;
        if data.version == entity.version {
            Some(data)
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut EntityData> {
        if entity.is_null() || entity.is_placeholder() {
            return None;
        }
        let data = self.dense.get_mut(entity.id as usize)?;
        if data.version == entity.version {
            Some(data)
        } else {
            None
        }
    }

    pub fn is_valid(&self, entity: Entity) -> bool {
        self.get(entity).is_some()
    }

    pub fn data_for_id(&self, id: u32) -> &EntityData {
        &self.dense[id as usize]
    }

    pub fn data_for_id_mut(&mut self, id: u32) -> &mut EntityData {
        &mut self.dense[id as usize]
    }

    /// Bump the version for `id`, invalidating any outstanding [`Entity`]
    /// values that reference it, and release the id for reuse (unless its
    /// version has saturated, in which case it is permanently retired).
    pub fn retire(&mut self, id: u32) {
        let data = &mut self.dense[id as usize];
        if data.version == u32::MAX {
            tracing::error!(entity_id = id, "entity version saturated, retiring id permanently");
            self.retired[id as usize] = true;
            return;
        }
        data.version += 1;
        data.signature = Signature::empty();
        data.archetype = ArchetypeId::EMPTY;
        data.pool_index = EntityData::NONE_POOL_INDEX;
        data.prototype_id = -1;
        self.free.push(id);
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
