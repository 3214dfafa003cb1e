//! Read-only iteration over a [`World`], for render/input/GUI-style
//! collaborators that never need to mutate structure directly.

use crate::component::{ComponentInfo, ComponentKind};
use crate::entity::Entity;
use crate::signature::Signature;
use crate::world::World;

/// An observer borrows a [`World`] immutably; every method here is safe to
/// call while iterating, including from within a running job (structural
/// edits discovered this way should go through a command buffer instead).
pub struct Observer<'w> {
    world: &'w World,
}

impl<'w> Observer<'w> {
    pub fn new(world: &'w World) -> Self {
        Observer { world }
    }

    /// Visit every live entity whose signature is a superset of `query`.
    pub fn for_each(&self, query: Signature, mut callback: impl FnMut(Entity)) {
        for (pool, archetype) in self.world.pools().iter().zip(self.world.archetypes()) {
            if !query.is_subset_of(archetype.signature) {
                continue;
            }
            for &entity in pool.entities() {
                callback(entity);
            }
        }
    }

    /// Visit every live instance of component `kind`, without requiring the
    /// caller to build a full [`Signature`] first.
    pub fn for_each_component(&self, kind: ComponentKind, mut callback: impl FnMut(Entity, *const u8)) {
        for (pool, archetype) in self.world.pools().iter().zip(self.world.archetypes()) {
            if !archetype.signature.contains(kind) {
                continue;
            }
            for row in 0..pool.size() {
                if let Some(ptr) = pool.component_ptr(kind, row) {
                    callback(pool.entity_at(row), ptr);
                }
            }
        }
    }

    pub fn component_info(&self, kind: ComponentKind) -> Option<&ComponentInfo> {
        self.world.registry().info(kind)
    }

    pub fn component_kind_from_name(&self, name: &str) -> Option<ComponentKind> {
        self.world.registry().kind_by_name(name)
    }

    pub fn entity_signature(&self, entity: Entity) -> Option<Signature> {
        self.world.entity_signature(entity)
    }

    pub fn has(&self, entity: Entity, kind: ComponentKind) -> bool {
        self.world.has(entity, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentInfo;

    #[test]
    fn for_each_visits_only_superset_archetypes() {
        let mut world = World::new();
        let a = world.register_component(ComponentInfo::of::<u32>("a"));
        let b = world.register_component(ComponentInfo::of::<u8>("b"));

        let with_a = world.create_entity(-1).unwrap();
        world.set_component(with_a, a, &1u32.to_ne_bytes()).unwrap();
        let with_ab = world.create_entity(-1).unwrap();
        world.set_component(with_ab, a, &2u32.to_ne_bytes()).unwrap();
        world.set_component(with_ab, b, &3u8.to_ne_bytes()).unwrap();
        let with_b = world.create_entity(-1).unwrap();
        world.set_component(with_b, b, &4u8.to_ne_bytes()).unwrap();

        let observer = Observer::new(&world);
        let mut seen = Vec::new();
        observer.for_each(Signature::single(a), |e| seen.push(e));
        seen.sort_by_key(|e| e.id);
        let mut expected = vec![with_a, with_ab];
        expected.sort_by_key(|e| e.id);
        assert_eq!(seen, expected);
    }

    #[test]
    fn for_each_component_reads_values_across_archetypes() {
        let mut world = World::new();
        let hp = world.register_component(ComponentInfo::of::<u32>("hp"));
        let tag = world.register_component(ComponentInfo::of::<u8>("tag"));
        let e1 = world.create_entity(-1).unwrap();
        world.set_component(e1, hp, &5u32.to_ne_bytes()).unwrap();
        let e2 = world.create_entity(-1).unwrap();
        world.set_component(e2, hp, &6u32.to_ne_bytes()).unwrap();
        world.set_component(e2, tag, &1u8.to_ne_bytes()).unwrap();

        let observer = Observer::new(&world);
        let mut total = 0u32;
        observer.for_each_component(hp, |_entity, ptr| {
            total += unsafe { *(ptr as *const u32) };
        });
        assert_eq!(total, 11);
    }

    #[test]
    fn component_kind_from_name_resolves_registered_components() {
        let mut world = World::new();
        let hp = world.register_component(ComponentInfo::of::<u32>("hp"));
        let observer = Observer::new(&world);
        assert_eq!(observer.component_kind_from_name("hp"), Some(hp));
        assert_eq!(observer.component_kind_from_name("missing"), None);
    }
}
