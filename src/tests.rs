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

//! End-to-end integration tests spanning archetypes, the command buffer,
//! the observer API and the job scheduler together.

#[cfg(test)]
mod tests {
    #![allow(clippy::module_inception)]
    use crate::component::{ComponentInfo, ComponentKind};
    use crate::error::Result;
    use crate::executor::JobScheduler;
    use crate::observer::Observer;
    use crate::schedule::{Schedule, System, SystemContext};
    use crate::system::{ComponentGroup, Job, JobChunk};
    use crate::{CommandBuffer, World};

    struct Position(f32, f32);
    struct Velocity(f32, f32);

    struct IntegrateVelocity {
        pos: ComponentKind,
        vel: ComponentKind,
    }
    impl Job for IntegrateVelocity {
        fn group(&self) -> ComponentGroup {
            ComponentGroup::new().writing(self.pos).reading(self.vel)
        }
        fn execute(&mut self, chunk: &JobChunk, row: usize, _commands: &mut CommandBuffer) {
            unsafe {
                let vel = chunk.read::<Velocity>(self.vel, row);
                let (dx, dy) = (vel.0, vel.1);
                let pos = chunk.write::<Position>(self.pos, row);
                pos.0 += dx;
                pos.1 += dy;
            }
        }
    }

    struct MovementSystem {
        pos: ComponentKind,
        vel: ComponentKind,
    }
    impl System for MovementSystem {
        fn name(&self) -> &'static str {
            "movement"
        }
        fn run(&mut self, ctx: &mut SystemContext) -> Result<()> {
            ctx.schedule(
                ComponentGroup::new().writing(self.pos).reading(self.vel),
                IntegrateVelocity { pos: self.pos, vel: self.vel },
            );
            Ok(())
        }
    }

    #[test]
    fn movement_system_integrates_velocity_across_every_matching_entity() {
        let mut world = World::new();
        let pos = world.register_component(ComponentInfo::of::<Position>("position"));
        let vel = world.register_component(ComponentInfo::of::<Velocity>("velocity"));

        let mut entities = Vec::new();
        for i in 0..40 {
            let e = world.create_entity(-1).unwrap();
            world.add_component(e, pos, Some(unsafe {
                std::slice::from_raw_parts(&Position(i as f32, 0.0) as *const _ as *const u8, std::mem::size_of::<Position>())
            })).unwrap();
            world.add_component(e, vel, Some(unsafe {
                std::slice::from_raw_parts(&Velocity(1.0, 2.0) as *const _ as *const u8, std::mem::size_of::<Velocity>())
            })).unwrap();
            entities.push(e);
        }

        let schedule = Schedule::new().with_system(Box::new(MovementSystem { pos, vel }));
        let mut scheduler = JobScheduler::new(schedule);
        scheduler.run_frame(&mut world).unwrap();

        for (i, &e) in entities.iter().enumerate() {
            let ptr = world.get_component(e, pos).unwrap() as *const Position;
            let p = unsafe { &*ptr };
            assert_eq!(p.0, i as f32 + 1.0);
            assert_eq!(p.1, 2.0);
        }
    }

    struct SpawnerJob {
        counter: ComponentKind,
    }
    impl Job for SpawnerJob {
        fn group(&self) -> ComponentGroup {
            ComponentGroup::new().reading(self.counter)
        }
        fn execute(&mut self, chunk: &JobChunk, row: usize, commands: &mut CommandBuffer) {
            let _ = chunk.entity(row);
            let child = commands.create_entity(-1);
            commands.add_component(child, self.counter, &7u32.to_ne_bytes());
        }
        fn parallel(&self) -> bool {
            false
        }
    }

    struct SpawnSystem {
        counter: ComponentKind,
    }
    impl System for SpawnSystem {
        fn name(&self) -> &'static str {
            "spawner"
        }
        fn run(&mut self, ctx: &mut SystemContext) -> Result<()> {
            ctx.schedule(ComponentGroup::new().reading(self.counter), SpawnerJob { counter: self.counter });
            Ok(())
        }
        fn flush_command_buffers(&self) -> bool {
            true
        }
    }

    #[test]
    fn barrier_system_applies_spawned_entities_before_the_next_frame() {
        let mut world = World::new();
        let counter = world.register_component(ComponentInfo::of::<u32>("counter"));
        for _ in 0..5 {
            let e = world.create_entity(-1).unwrap();
            world.set_component(e, counter, &1u32.to_ne_bytes()).unwrap();
        }

        let schedule = Schedule::new().with_system(Box::new(SpawnSystem { counter }));
        let mut scheduler = JobScheduler::new(schedule);
        scheduler.run_frame(&mut world).unwrap();

        let mut total_entities = 0;
        let mut total_counter_value = 0u32;
        let observer = Observer::new(&world);
        observer.for_each_component(counter, |_e, ptr| {
            total_entities += 1;
            total_counter_value += unsafe { *(ptr as *const u32) };
        });
        assert_eq!(total_entities, 10);
        assert_eq!(total_counter_value, 5 + 5 * 7);
    }

    struct OrderedSystem {
        name: &'static str,
        log: ComponentKind,
    }
    struct AppendLog {
        name: &'static str,
        log: ComponentKind,
    }
    impl Job for AppendLog {
        fn group(&self) -> ComponentGroup {
            ComponentGroup::new().writing(self.log)
        }
        fn execute(&mut self, chunk: &JobChunk, row: usize, _commands: &mut CommandBuffer) {
            unsafe {
                let entries = chunk.write::<Vec<&'static str>>(self.log, row);
                entries.push(self.name);
            }
        }
        fn parallel(&self) -> bool {
            false
        }
    }
    impl System for OrderedSystem {
        fn name(&self) -> &'static str {
            self.name
        }
        fn run(&mut self, ctx: &mut SystemContext) -> Result<()> {
            ctx.schedule(ComponentGroup::new().writing(self.log), AppendLog { name: self.name, log: self.log });
            Ok(())
        }
    }

    #[test]
    fn order_after_makes_systems_run_in_declared_order_despite_registration_order() {
        let mut world = World::new();
        let log = world.register_component(ComponentInfo::of::<Vec<&'static str>>("log"));
        let e = world.create_entity(-1).unwrap();
        world.add_component(e, log, None).unwrap();
        unsafe {
            let ptr = world.get_component_mut(e, log).unwrap() as *mut Vec<&'static str>;
            ptr.write(Vec::new());
        }

        let mut schedule = Schedule::new();
        schedule.add_system(Box::new(OrderedSystem { name: "second", log }));
        schedule.add_system(Box::new(OrderedSystem { name: "first", log }));
        schedule.order_after("second", "first");

        let mut scheduler = JobScheduler::new(schedule);
        scheduler.run_frame(&mut world).unwrap();

        let ptr = world.get_component(e, log).unwrap() as *const Vec<&'static str>;
        let entries = unsafe { &*ptr };
        assert_eq!(entries.as_slice(), &["first", "second"]);
    }
}
