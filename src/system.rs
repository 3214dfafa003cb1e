//! Component groups and the job trait.
//!
//! A [`ComponentGroup`] is the compile-time-visible access pattern a job
//! declares over component kinds. The scheduler uses it both to find which
//! archetype pools a job touches and to detect conflicts between jobs.

use crate::archetype::ArchetypePool;
use crate::command::CommandBuffer;
use crate::component::ComponentKind;
use crate::entity::Entity;
use crate::signature::Signature;

/// Declared read/write/subtract access over component kinds for one job.
#[derive(Clone, Copy, Debug, Default)]
pub struct ComponentGroup {
    pub read: Signature,
    pub write: Signature,
    pub subtract: Signature,
}

impl ComponentGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reading(mut self, kind: ComponentKind) -> Self {
        self.read.set(kind);
        self
    }

    pub fn writing(mut self, kind: ComponentKind) -> Self {
        self.write.set(kind);
        self
    }

    pub fn without(mut self, kind: ComponentKind) -> Self {
        self.subtract.set(kind);
        self
    }

    /// All kinds this group touches, read or write.
    pub fn accessed(&self) -> Signature {
        self.read.union(self.write)
    }

    /// Does `signature` satisfy this group's required/forbidden kinds?
    pub fn matches(&self, signature: Signature) -> bool {
        self.accessed().is_subset_of(signature) && !signature.intersects(self.subtract)
    }

    /// Two groups conflict if one's writes overlap the other's reads or
    /// writes, in either direction.
    pub fn conflicts_with(&self, other: &ComponentGroup) -> bool {
        self.write.intersects(other.read.union(other.write))
            || other.write.intersects(self.read.union(self.write))
    }
}

/// A read-only view over one contiguous row range of a matching archetype
/// pool, handed to a [`Job`] during chunk dispatch.
pub struct JobChunk<'a> {
    pool: &'a ArchetypePool,
    pub start: usize,
    pub end: usize,
}

impl<'a> JobChunk<'a> {
    pub fn new(pool: &'a ArchetypePool, start: usize, end: usize) -> Self {
        JobChunk { pool, start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn entity(&self, row: usize) -> Entity {
        self.pool.entity_at(row)
    }

    /// Read `kind`'s value at `row`.
    ///
    /// # Safety
    /// `row` must be within `[start, end)` and `kind` must be declared in
    /// the issuing job's `ComponentGroup::read` or `write`; the scheduler
    /// only guarantees non-aliasing access for declared kinds.
    pub unsafe fn read<T>(&self, kind: ComponentKind, row: usize) -> &T {
        &*(self.pool.component_ptr(kind, row).expect("undeclared component read") as *const T)
    }

    /// Write `kind`'s value at `row`.
    ///
    /// # Safety
    /// Same requirements as [`Self::read`], plus `kind` must be in
    /// `ComponentGroup::write`.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn write<T>(&self, kind: ComponentKind, row: usize) -> &mut T {
        &mut *(self.pool.component_ptr(kind, row).expect("undeclared component write") as *mut T)
    }
}

/// A unit of parallelizable work over archetype pools matching its
/// [`ComponentGroup`].
pub trait Job: Send {
    fn group(&self) -> ComponentGroup;

    /// Run once per chunk before any row is processed.
    fn init(&mut self, _chunk: &JobChunk) {}

    /// Process one row of the current chunk. Structural edits go through
    /// `commands`, a buffer private to this job, rather than the world
    /// directly (the world is locked for the duration of the system).
    fn execute(&mut self, chunk: &JobChunk, row: usize, commands: &mut CommandBuffer);

    /// Jobs with `parallel == true` may have their chunks dispatched across
    /// the worker pool; the scheduler only does so when the job's archetype
    /// pool is large enough to be worth splitting.
    fn parallel(&self) -> bool {
        true
    }

    /// Must run on the thread driving the scheduler, never in a worker.
    fn main_thread(&self) -> bool {
        false
    }

    /// No other job may run concurrently with this one, even across
    /// unrelated pools.
    fn blocking(&self) -> bool {
        false
    }
}

/// Opaque handle to a job scheduled within the current system, used to
/// express explicit dependencies.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct JobHandle(pub(crate) u32);
