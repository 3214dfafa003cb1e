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

//! Error types

use std::fmt;

/// ECS error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcsError {
    /// Entity's version no longer matches the registry (use-after-delete).
    StaleEntity,

    /// The null entity was passed where a live entity was required.
    NullEntity,

    /// No free entity ids remain and the id counter is at `max_entities`.
    EntitySpaceExhausted,

    /// Component kind outside the registered range.
    UnknownComponent,

    /// Attempted to write a component kind marked `prototype_only`.
    PrototypeWrite,

    /// A command buffer referenced a placeholder entity that was never
    /// created by a preceding `Create` command in the same apply.
    UnresolvedPlaceholder,

    /// The job/system dependency graph contains a cycle.
    SystemCycleDetected,

    /// A structural mutation was attempted directly on a locked world; route
    /// it through the job's command buffer instead.
    WorldLocked,
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::StaleEntity => write!(f, "entity reference is stale"),
            EcsError::NullEntity => write!(f, "entity is null"),
            EcsError::EntitySpaceExhausted => write!(f, "entity id space exhausted"),
            EcsError::UnknownComponent => write!(f, "component kind is not registered"),
            EcsError::PrototypeWrite => write!(f, "cannot write a prototype-only component"),
            EcsError::UnresolvedPlaceholder => write!(f, "command buffer references an unresolved placeholder entity"),
            EcsError::SystemCycleDetected => write!(f, "job dependency cycle detected"),
            EcsError::WorldLocked => write!(f, "world is locked during job execution"),
        }
    }
}

impl std::error::Error for EcsError {}

/// Result type alias
pub type Result<T> = std::result::Result<T, EcsError>;
