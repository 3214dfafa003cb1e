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

//! Deferred structural mutation.
//!
//! A [`CommandBuffer`] is an append-only log of structural edits plus a
//! byte buffer holding the component values those edits reference. Entities
//! created through the buffer are identified by placeholder ids drawn from
//! above [`MAX_ENTITIES`]; [`CommandBuffer::apply`] resolves them to real
//! entities as it replays the log against a [`World`].

use rustc_hash::FxHashMap;

use crate::component::ComponentKind;
use crate::entity::{Entity, MAX_ENTITIES};
use crate::error::Result;
use crate::prototype::PrototypeId;
use crate::signature::Signature;
use crate::world::World;

enum CommandKind {
    Create { prototype_id: PrototypeId },
    Add { kind: ComponentKind, value_offset: usize },
    AddSignature { signature: Signature },
    Set { kind: ComponentKind, value_offset: usize },
    Remove { kind: ComponentKind },
    Delete,
}

struct Command {
    entity: Entity,
    kind: CommandKind,
}

/// Append-only record of deferred mutations, applied to a [`World`] at a
/// barrier.
#[derive(Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
    values: Vec<u8>,
    next_placeholder: u32,
}

impl CommandBuffer {
    pub fn new() -> Self {
        CommandBuffer { commands: Vec::new(), values: Vec::new(), next_placeholder: MAX_ENTITIES + 1 }
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.values.clear();
    }

    /// Enqueue a deferred entity creation. The returned [`Entity`] is a
    /// placeholder, valid only as an argument to this same buffer until
    /// [`Self::apply`] resolves it.
    pub fn create_entity(&mut self, prototype_id: PrototypeId) -> Entity {
        let id = self.next_placeholder;
        self.next_placeholder += 1;
        let entity = Entity { id, version: 1 };
        self.commands.push(Command { entity, kind: CommandKind::Create { prototype_id } });
        entity
    }

    pub fn add_component(&mut self, entity: Entity, kind: ComponentKind, value: &[u8]) {
        let value_offset = self.values.len();
        self.values.extend_from_slice(value);
        self.commands.push(Command { entity, kind: CommandKind::Add { kind, value_offset } });
    }

    pub fn add_signature(&mut self, entity: Entity, signature: Signature) {
        self.commands.push(Command { entity, kind: CommandKind::AddSignature { signature } });
    }

    pub fn set_component(&mut self, entity: Entity, kind: ComponentKind, value: &[u8]) {
        let value_offset = self.values.len();
        self.values.extend_from_slice(value);
        self.commands.push(Command { entity, kind: CommandKind::Set { kind, value_offset } });
    }

    pub fn remove_component(&mut self, entity: Entity, kind: ComponentKind) {
        self.commands.push(Command { entity, kind: CommandKind::Remove { kind } });
    }

    pub fn delete_entity(&mut self, entity: Entity) {
        self.commands.push(Command { entity, kind: CommandKind::Delete });
    }

    /// Append `other`'s commands onto `self`, rebasing its value-buffer
    /// offsets by `self`'s current length. `other` is left empty.
    pub fn merge(&mut self, mut other: CommandBuffer) {
        let offset_diff = self.values.len();
        for command in &mut other.commands {
            match &mut command.kind {
                CommandKind::Add { value_offset, .. } | CommandKind::Set { value_offset, .. } => {
                    *value_offset += offset_diff;
                }
                _ => {}
            }
        }
        self.commands.append(&mut other.commands);
        self.values.append(&mut other.values);
    }

    /// Replay every command against `world`, resolving this buffer's own
    /// placeholder entities to real ones as `Create` commands run. Commands
    /// referencing a placeholder with no prior `Create` in this buffer are
    /// skipped and logged.
    pub fn apply(&mut self, world: &mut World) -> Result<()> {
        let mut placeholders: FxHashMap<u32, Entity> = FxHashMap::default();
        for command in self.commands.drain(..) {
            let resolved = if command.entity.id > MAX_ENTITIES {
                match placeholders.get(&command.entity.id) {
                    Some(&real) => real,
                    None if matches!(command.kind, CommandKind::Create { .. }) => Entity::NULL,
                    None => {
                        tracing::warn!(
                            placeholder = command.entity.id,
                            "command buffer references unresolved placeholder entity, skipping"
                        );
                        continue;
                    }
                }
            } else {
                command.entity
            };

            match command.kind {
                CommandKind::Create { prototype_id } => match world.create_entity(prototype_id) {
                    Ok(real) => {
                        placeholders.insert(command.entity.id, real);
                    }
                    Err(err) => tracing::warn!(?err, "deferred create_entity failed, skipping"),
                },
                CommandKind::Add { kind, value_offset } => {
                    let size = world.registry().size(kind);
                    let value = &self.values[value_offset..value_offset + size];
                    if let Err(err) = world.add_component(resolved, kind, Some(value)) {
                        tracing::warn!(?err, "deferred add_component failed, skipping");
                    }
                }
                CommandKind::AddSignature { signature } => {
                    if let Err(err) = world.add_signature(resolved, signature) {
                        tracing::warn!(?err, "deferred add_signature failed, skipping");
                    }
                }
                CommandKind::Set { kind, value_offset } => {
                    let size = world.registry().size(kind);
                    let value = &self.values[value_offset..value_offset + size];
                    if let Err(err) = world.set_component(resolved, kind, value) {
                        tracing::warn!(?err, "deferred set_component failed, skipping");
                    }
                }
                CommandKind::Remove { kind } => {
                    if let Err(err) = world.remove_component(resolved, kind) {
                        tracing::warn!(?err, "deferred remove_component failed, skipping");
                    }
                }
                CommandKind::Delete => {
                    if let Err(err) = world.delete_entity(resolved) {
                        tracing::warn!(?err, "deferred delete_entity failed, skipping");
                    }
                }
            }
        }
        self.values.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentInfo;

    #[test]
    fn placeholder_create_then_add_resolves_on_apply() {
        let mut world = World::new();
        let health = world.register_component(ComponentInfo::of::<u32>("health"));

        let mut buffer = CommandBuffer::new();
        let placeholder = buffer.create_entity(-1);
        assert!(placeholder.is_placeholder());
        buffer.add_component(placeholder, health, &100u32.to_ne_bytes());

        buffer.apply(&mut world).unwrap();

        assert!(!world.is_valid(placeholder));
        let mut found = None;
        for id in 0..4u32 {
            let candidate = Entity { id, version: 1 };
            if world.is_valid(candidate) {
                found = Some(candidate);
                break;
            }
        }
        let real = found.expect("apply should have created exactly one real entity");
        let value = unsafe { *(world.get_component(real, health).unwrap() as *const u32) };
        assert_eq!(value, 100);
    }

    #[test]
    fn unresolved_placeholder_is_skipped_not_fatal() {
        let mut world = World::new();
        let health = world.register_component(ComponentInfo::of::<u32>("health"));
        let mut buffer = CommandBuffer::new();
        let phantom = Entity { id: MAX_ENTITIES + 5, version: 1 };
        buffer.add_component(phantom, health, &1u32.to_ne_bytes());
        assert!(buffer.apply(&mut world).is_ok());
    }

    #[test]
    fn merge_rebases_value_offsets() {
        let mut world = World::new();
        let score = world.register_component(ComponentInfo::of::<u32>("score"));
        let e = world.create_entity(-1).unwrap();

        let mut first = CommandBuffer::new();
        first.set_component(e, score, &1u32.to_ne_bytes());
        let mut second = CommandBuffer::new();
        second.set_component(e, score, &2u32.to_ne_bytes());

        first.merge(second);
        first.apply(&mut world).unwrap();
        let value = unsafe { *(world.get_component(e, score).unwrap() as *const u32) };
        assert_eq!(value, 2);
    }
}
