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

//! Archetype storage: column-major, signature-keyed component storage.

use smallvec::SmallVec;

use crate::component::{ComponentKind, ComponentRegistry};
use crate::entity::Entity;
use crate::signature::Signature;
use crate::utils::align_to;

/// Index into the world's archetype table. `EMPTY` is reserved for the
/// archetype with no components, which every entity starts in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ArchetypeId(pub u32);

impl ArchetypeId {
    pub const EMPTY: ArchetypeId = ArchetypeId(0);

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Immutable descriptor of the layout shared by every entity with a given
/// [`Signature`]: which component kinds it carries, in ascending order.
pub struct Archetype {
    pub id: ArchetypeId,
    pub signature: Signature,
    pub components: SmallVec<[ComponentKind; 8]>,
}

impl Archetype {
    pub fn new(id: ArchetypeId, signature: Signature) -> Self {
        Archetype { id, signature, components: signature.iter().collect() }
    }

    pub fn column_position(&self, kind: ComponentKind) -> Option<usize> {
        self.components.iter().position(|k| *k == kind)
    }
}

/// Column-major storage for every entity sharing one archetype.
///
/// The buffer is partitioned into `components.len()` columns; column `i`
/// holds `capacity` back-to-back values of `components[i]`, starting at
/// `column_offset[i]`, which is always a multiple of that kind's alignment.
pub struct ArchetypePool {
    archetype: ArchetypeId,
    components: SmallVec<[ComponentKind; 8]>,
    sizes: SmallVec<[usize; 8]>,
    alignments: SmallVec<[usize; 8]>,
    column_offsets: SmallVec<[usize; 8]>,
    entities: Vec<Entity>,
    buffer: Vec<u8>,
    capacity: usize,
}

impl ArchetypePool {
    pub fn new(archetype: &Archetype, registry: &ComponentRegistry, initial_capacity: usize) -> Self {
        let sizes: SmallVec<[usize; 8]> =
            archetype.components.iter().map(|k| registry.size(*k)).collect();
        let alignments: SmallVec<[usize; 8]> =
            archetype.components.iter().map(|k| registry.alignment(*k)).collect();
        let mut pool = ArchetypePool {
            archetype: archetype.id,
            components: archetype.components.clone(),
            sizes,
            alignments,
            column_offsets: SmallVec::new(),
            entities: Vec::new(),
            buffer: Vec::new(),
            capacity: 0,
        };
        if initial_capacity > 0 {
            pool.grow_to(initial_capacity);
        }
        pool
    }

    fn layout_for_capacity(&self, capacity: usize) -> (SmallVec<[usize; 8]>, usize) {
        let mut offsets = SmallVec::new();
        let mut cursor = 0usize;
        for (size, alignment) in self.sizes.iter().zip(self.alignments.iter()) {
            let offset = align_to(cursor, (*alignment).max(1));
            offsets.push(offset);
            cursor = offset + size * capacity;
        }
        (offsets, cursor)
    }

    fn grow_to(&mut self, new_capacity: usize) {
        let (new_offsets, total) = self.layout_for_capacity(new_capacity);
        let mut new_buffer = vec![0u8; total];
        for i in 0..self.components.len() {
            let live_bytes = self.sizes[i] * self.size();
            if live_bytes > 0 {
                let old_offset = self.column_offsets.get(i).copied().unwrap_or(0);
                unsafe {
                    std::ptr::copy_nonoverlapping(
                        self.buffer.as_ptr().add(old_offset),
                        new_buffer.as_mut_ptr().add(new_offsets[i]),
                        live_bytes,
                    );
                }
            }
        }
        self.buffer = new_buffer;
        self.column_offsets = new_offsets;
        self.capacity = new_capacity;
    }

    pub fn size(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn archetype_id(&self) -> ArchetypeId {
        self.archetype
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity_at(&self, row: usize) -> Entity {
        self.entities[row]
    }

    /// Append a new row for `entity`, growing the backing buffer if full.
    /// Component values in the new row are left uninitialized.
    pub fn push_back(&mut self, entity: Entity) -> usize {
        if self.size() == self.capacity {
            let new_capacity = (self.capacity * 2).max(self.size() + 1);
            self.grow_to(new_capacity);
        }
        let row = self.entities.len();
        self.entities.push(entity);
        row
    }

    /// Swap-remove row `row`. Returns the entity that was moved into its
    /// place, if any, so the caller can patch that entity's `pool_index`.
    ///
    /// Does not run component destructors; callers that are deleting the
    /// row's data (rather than migrating it elsewhere) must do so first via
    /// [`Self::component_ptr_mut`] and the registry's destructors.
    pub fn remove(&mut self, row: usize) -> Option<Entity> {
        let last = self.entities.len() - 1;
        if row == last {
            self.entities.pop();
            return None;
        }
        for i in 0..self.components.len() {
            let size = self.sizes[i];
            if size == 0 {
                continue;
            }
            let offset = self.column_offsets[i];
            unsafe {
                let base = self.buffer.as_mut_ptr().add(offset);
                let src = base.add(last * size);
                let dst = base.add(row * size);
                std::ptr::copy_nonoverlapping(src, dst, size);
            }
        }
        self.entities[row] = self.entities[last];
        self.entities.pop();
        Some(self.entities[row])
    }

    fn column_offset_for(&self, kind: ComponentKind) -> Option<(usize, usize)> {
        let pos = self.components.iter().position(|k| *k == kind)?;
        Some((self.column_offsets[pos], self.sizes[pos]))
    }

    pub fn component_ptr(&self, kind: ComponentKind, row: usize) -> Option<*const u8> {
        let (offset, size) = self.column_offset_for(kind)?;
        Some(unsafe { self.buffer.as_ptr().add(offset + row * size) })
    }

    pub fn component_ptr_mut(&mut self, kind: ComponentKind, row: usize) -> Option<*mut u8> {
        let (offset, size) = self.column_offset_for(kind)?;
        Some(unsafe { self.buffer.as_mut_ptr().add(offset + row * size) })
    }

    /// Invoke `kind`'s registered destructor, if any, on `row`'s value.
    pub fn destroy_component(&mut self, kind: ComponentKind, row: usize, registry: &ComponentRegistry) {
        if let Some(destructor) = registry.destructor(kind) {
            if let Some(ptr) = self.component_ptr_mut(kind, row) {
                destructor(ptr);
            }
        }
    }

    /// Invoke destructors for every component of every live row. Called by
    /// the owning manager when the pool itself is torn down.
    pub fn destroy_all(&mut self, registry: &ComponentRegistry) {
        for row in 0..self.size() {
            for kind in self.components.clone() {
                self.destroy_component(kind, row, registry);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_two_kinds() -> (ComponentRegistry, ComponentKind, ComponentKind) {
        let mut reg = ComponentRegistry::new();
        let a = reg.register(crate::component::ComponentInfo::of::<u32>("a"));
        let b = reg.register(crate::component::ComponentInfo::of::<u8>("b"));
        (reg, a, b)
    }

    #[test]
    fn push_back_grows_and_preserves_values() {
        let (reg, a, _b) = registry_with_two_kinds();
        let sig = Signature::single(a);
        let archetype = Archetype::new(ArchetypeId(1), sig);
        let mut pool = ArchetypePool::new(&archetype, &reg, 0);

        for i in 0..5u32 {
            let row = pool.push_back(Entity { id: i, version: 1 });
            unsafe {
                *(pool.component_ptr_mut(a, row).unwrap() as *mut u32) = i * 10;
            }
        }
        for i in 0..5u32 {
            let value = unsafe { *(pool.component_ptr(a, i as usize).unwrap() as *const u32) };
            assert_eq!(value, i * 10);
        }
    }

    #[test]
    fn swap_remove_patches_displaced_entity() {
        let (reg, a, _b) = registry_with_two_kinds();
        let sig = Signature::single(a);
        let archetype = Archetype::new(ArchetypeId(1), sig);
        let mut pool = ArchetypePool::new(&archetype, &reg, 0);

        let e1 = Entity { id: 1, version: 1 };
        let e2 = Entity { id: 2, version: 1 };
        let e3 = Entity { id: 3, version: 1 };
        for (e, v) in [(e1, 10u32), (e2, 20), (e3, 30)] {
            let row = pool.push_back(e);
            unsafe {
                *(pool.component_ptr_mut(a, row).unwrap() as *mut u32) = v;
            }
        }

        let moved = pool.remove(1);
        assert_eq!(moved, Some(e3));
        assert_eq!(pool.size(), 2);
        let value = unsafe { *(pool.component_ptr(a, 1).unwrap() as *const u32) };
        assert_eq!(value, 30);
    }

    #[test]
    fn removing_last_row_returns_none() {
        let (reg, a, _b) = registry_with_two_kinds();
        let sig = Signature::single(a);
        let archetype = Archetype::new(ArchetypeId(1), sig);
        let mut pool = ArchetypePool::new(&archetype, &reg, 0);
        let row = pool.push_back(Entity { id: 1, version: 1 });
        assert_eq!(pool.remove(row), None);
        assert_eq!(pool.size(), 0);
    }
}
