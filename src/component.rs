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

//! Table-driven component registration.
//!
//! Component kinds are not expressed through Rust's type system. The
//! registry is built once, by position, from a list of [`ComponentInfo`]
//! records; this is what lets the command buffer and the observer API
//! operate on components by numeric kind or by name instead of by type.

use smallvec::SmallVec;

/// Small integer identifying a registered component kind.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentKind(pub(crate) u16);

impl std::fmt::Debug for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ComponentKind({})", self.0)
    }
}

impl ComponentKind {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// A destructor invoked on a component value before its backing bytes are
/// overwritten or freed. Only needed for components that own resources
/// outside the archetype pool buffer.
pub type Destructor = Box<dyn Fn(*mut u8) + Send + Sync>;

/// Static description of one component kind, supplied at registration time.
pub struct ComponentInfo {
    pub name: &'static str,
    pub size: usize,
    pub alignment: usize,
    pub prototype_only: bool,
    pub destructor: Option<Destructor>,
}

impl ComponentInfo {
    pub fn of<T: 'static>(name: &'static str) -> Self {
        ComponentInfo {
            name,
            size: std::mem::size_of::<T>(),
            alignment: std::mem::align_of::<T>(),
            prototype_only: false,
            destructor: if std::mem::needs_drop::<T>() {
                Some(Box::new(|ptr: *mut u8| unsafe {
                    std::ptr::drop_in_place(ptr as *mut T);
                }))
            } else {
                None
            },
        }
    }

    pub fn prototype_only(mut self) -> Self {
        self.prototype_only = true;
        self
    }
}

/// Fixed table of registered component kinds, built once at startup.
pub struct ComponentRegistry {
    infos: SmallVec<[ComponentInfo; 16]>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        ComponentRegistry { infos: SmallVec::new() }
    }

    /// Register a component kind, returning its assigned id. Kinds are
    /// numbered by registration order and cannot be unregistered.
    pub fn register(&mut self, info: ComponentInfo) -> ComponentKind {
        assert!(
            (self.infos.len() as u32) < crate::signature::MAX_COMPONENT_KINDS,
            "component kind space exhausted"
        );
        let kind = ComponentKind(self.infos.len() as u16);
        self.infos.push(info);
        kind
    }

    pub fn kind_count(&self) -> usize {
        self.infos.len()
    }

    pub fn info(&self, kind: ComponentKind) -> Option<&ComponentInfo> {
        self.infos.get(kind.index())
    }

    pub fn size(&self, kind: ComponentKind) -> usize {
        self.info(kind).map(|i| i.size).unwrap_or(0)
    }

    pub fn alignment(&self, kind: ComponentKind) -> usize {
        self.info(kind).map(|i| i.alignment).unwrap_or(1)
    }

    pub fn name(&self, kind: ComponentKind) -> Option<&'static str> {
        self.info(kind).map(|i| i.name)
    }

    pub fn is_prototype_only(&self, kind: ComponentKind) -> bool {
        self.info(kind).map(|i| i.prototype_only).unwrap_or(false)
    }

    pub fn destructor(&self, kind: ComponentKind) -> Option<&Destructor> {
        self.info(kind).and_then(|i| i.destructor.as_ref())
    }

    pub fn kind_by_name(&self, name: &str) -> Option<ComponentKind> {
        self.infos
            .iter()
            .position(|i| i.name == name)
            .map(|idx| ComponentKind(idx as u16))
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_assigns_kinds_by_position() {
        let mut reg = ComponentRegistry::new();
        let a = reg.register(ComponentInfo::of::<u32>("a"));
        let b = reg.register(ComponentInfo::of::<u8>("b"));
        assert_eq!(a.0, 0);
        assert_eq!(b.0, 1);
        assert_eq!(reg.size(a), 4);
        assert_eq!(reg.size(b), 1);
        assert_eq!(reg.name(a), Some("a"));
    }

    #[test]
    fn kind_by_name_roundtrips() {
        let mut reg = ComponentRegistry::new();
        let k = reg.register(ComponentInfo::of::<u64>("position"));
        assert_eq!(reg.kind_by_name("position"), Some(k));
        assert_eq!(reg.kind_by_name("missing"), None);
    }

    #[test]
    fn prototype_only_flag_roundtrips() {
        let mut reg = ComponentRegistry::new();
        let k = reg.register(ComponentInfo::of::<u32>("const_data").prototype_only());
        assert!(reg.is_prototype_only(k));
    }
}
