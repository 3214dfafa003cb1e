//! Convenient re-exports of commonly used types.
//!
//! ```
//! use archetype_ecs::prelude::*;
//! ```

pub use crate::command::CommandBuffer;
pub use crate::component::{ComponentInfo, ComponentKind, ComponentRegistry};
pub use crate::config::WorldConfig;
pub use crate::entity::Entity;
pub use crate::error::{EcsError, Result};
pub use crate::executor::JobScheduler;
pub use crate::observer::Observer;
pub use crate::prototype::{PrototypeBuilder, PrototypeId, PrototypeTable};
pub use crate::schedule::{Schedule, System, SystemContext};
pub use crate::signature::Signature;
pub use crate::system::{ComponentGroup, Job, JobChunk, JobHandle};
pub use crate::world::World;
