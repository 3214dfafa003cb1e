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

//! Archetype ECS core
//!
//! Entity storage, a deferred command buffer, and a conflict-aware job
//! scheduler for a 2D game world, built around fixed-width signatures
//! rather than Rust's type system.

pub mod archetype;
pub mod command;
pub mod component;
pub mod config;
pub mod dependency;
pub mod entity;
pub mod error;
pub mod executor;
pub mod observer;
pub mod prototype;
pub mod schedule;
pub mod signature;
pub mod system;
pub mod utils;
pub mod world;

pub mod prelude;

pub use command::CommandBuffer;
pub use component::{ComponentInfo, ComponentKind, ComponentRegistry};
pub use config::WorldConfig;
pub use entity::Entity;
pub use error::{EcsError, Result};
pub use executor::JobScheduler;
pub use observer::Observer;
pub use prototype::{PrototypeBuilder, PrototypeId, PrototypeTable};
pub use schedule::{Schedule, System, SystemContext};
pub use signature::Signature;
pub use system::{ComponentGroup, Job, JobChunk, JobHandle};
pub use world::World;

#[cfg(test)]
mod tests;
