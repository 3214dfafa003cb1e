//! Startup configuration for a [`World`](crate::world::World).

use crate::entity::MAX_ENTITIES;
use crate::signature::MAX_COMPONENT_KINDS;

/// Plain configuration passed to [`World::with_config`](crate::world::World::with_config).
/// `World::new()` uses [`WorldConfig::default`].
#[derive(Clone, Copy, Debug)]
pub struct WorldConfig {
    /// Hard cap on the entity id space.
    pub max_entities: u32,
    /// Signature bit width; cannot exceed the 64-bit [`Signature`](crate::signature::Signature).
    pub max_component_kinds: u32,
    /// Size of the dedicated rayon thread pool backing the job scheduler.
    /// `0` disables parallel job execution entirely.
    pub worker_thread_count: usize,
    /// First allocation size for a freshly created archetype pool.
    pub initial_pool_capacity: usize,
    /// Global kill switch for parallel job dispatch, independent of
    /// `worker_thread_count`.
    pub enable_parallelism: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        WorldConfig {
            max_entities: MAX_ENTITIES,
            max_component_kinds: MAX_COMPONENT_KINDS,
            worker_thread_count: workers.saturating_sub(1).max(1),
            initial_pool_capacity: 1,
            enable_parallelism: true,
        }
    }
}
