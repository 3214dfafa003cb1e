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

//! Prototypes: immutable shared default component bundles.
//!
//! An entity spawned from a prototype falls back to the prototype's value
//! for any component the prototype carries but the entity's own archetype
//! does not. Components marked `prototype_only` in the registry can never
//! live in an archetype column; they only ever exist here.

use rustc_hash::FxHashMap;

use crate::component::ComponentKind;
use crate::signature::Signature;

/// Densely packed identifier for a registered prototype.
pub type PrototypeId = i32;

/// One named, immutable default bundle.
pub struct Prototype {
    pub signature: Signature,
    offsets: FxHashMap<ComponentKind, usize>,
    buffer: Vec<u8>,
}

impl Prototype {
    pub fn component_ptr(&self, kind: ComponentKind) -> Option<*const u8> {
        let offset = *self.offsets.get(&kind)?;
        Some(unsafe { self.buffer.as_ptr().add(offset) })
    }
}

/// Builder for one prototype's component values, handed to
/// [`PrototypeTable::register`].
pub struct PrototypeBuilder {
    signature: Signature,
    offsets: FxHashMap<ComponentKind, usize>,
    buffer: Vec<u8>,
}

impl PrototypeBuilder {
    pub fn new() -> Self {
        PrototypeBuilder { signature: Signature::empty(), offsets: FxHashMap::default(), buffer: Vec::new() }
    }

    /// Add a component's default value. `value` must be exactly
    /// `registry.size(kind)` bytes, already laid out for that kind.
    pub fn with_raw(mut self, kind: ComponentKind, value: &[u8]) -> Self {
        let offset = self.buffer.len();
        self.buffer.extend_from_slice(value);
        self.offsets.insert(kind, offset);
        self.signature.set(kind);
        self
    }

    pub fn with<T: 'static>(self, kind: ComponentKind, value: T) -> Self {
        let bytes =
            unsafe { std::slice::from_raw_parts(&value as *const T as *const u8, std::mem::size_of::<T>()) };
        let result = self.with_raw(kind, bytes);
        std::mem::forget(value);
        result
    }

    fn build(self) -> Prototype {
        Prototype { signature: self.signature, offsets: self.offsets, buffer: self.buffer }
    }
}

impl Default for PrototypeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Registered prototypes, keyed by densely-packed id.
pub struct PrototypeTable {
    prototypes: Vec<Prototype>,
}

impl PrototypeTable {
    pub fn new() -> Self {
        PrototypeTable { prototypes: Vec::new() }
    }

    pub fn register(&mut self, builder: PrototypeBuilder) -> PrototypeId {
        let id = self.prototypes.len() as PrototypeId;
        self.prototypes.push(builder.build());
        id
    }

    pub fn get(&self, id: PrototypeId) -> Option<&Prototype> {
        if id < 0 {
            return None;
        }
        self.prototypes.get(id as usize)
    }
}

impl Default for PrototypeTable {
    fn default() -> Self {
        Self::new()
    }
}
