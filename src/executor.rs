//! The job scheduler: drives one frame's systems in order, stages each
//! system's jobs by conflict, and dispatches non-conflicting jobs (and,
//! within a job, non-overlapping row chunks) across the worker pool.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::archetype::ArchetypePool;
use crate::command::CommandBuffer;
use crate::dependency::{DependencyGraph, JobStage};
use crate::error::Result;
use crate::schedule::{JobSpec, Schedule, SystemContext, SystemId};
use crate::system::{Job, JobChunk};
use crate::world::World;

/// The dedicated thread pool (or absence of one) threaded through a single
/// [`JobScheduler::run_frame`] call's stage/job/chunk dispatch.
#[cfg(feature = "parallel")]
type PoolRef<'a> = Option<&'a rayon::ThreadPool>;
#[cfg(not(feature = "parallel"))]
type PoolRef<'a> = ();

/// A raw pointer wrapper asserting the pointee may be handed to another
/// thread. Sound only when the caller has independently established that
/// concurrent dereferences touch disjoint memory, as the conflict-based
/// stage construction in [`DependencyGraph`] guarantees for jobs sharing a
/// stage, and as chunk row ranges guarantee for chunks of one job.
#[cfg(feature = "parallel")]
struct RawSend<T: ?Sized>(*mut T);
#[cfg(feature = "parallel")]
unsafe impl<T: ?Sized> Send for RawSend<T> {}
#[cfg(feature = "parallel")]
unsafe impl<T: ?Sized> Sync for RawSend<T> {}
#[cfg(feature = "parallel")]
impl<T: ?Sized> Clone for RawSend<T> {
    fn clone(&self) -> Self {
        *self
    }
}
#[cfg(feature = "parallel")]
impl<T: ?Sized> Copy for RawSend<T> {}
#[cfg(feature = "parallel")]
impl<T: ?Sized> RawSend<T> {
    /// # Safety
    /// See the caller's safety comment at each use site.
    unsafe fn deref_mut<'a>(&self) -> &'a mut T {
        &mut *self.0
    }
}
#[cfg(feature = "parallel")]
impl<T> RawSend<T> {
    /// # Safety
    /// See the caller's safety comment at each use site.
    unsafe fn add_deref_mut<'a>(&self, offset: usize) -> &'a mut T {
        &mut *self.0.add(offset)
    }
}

/// Owns a [`Schedule`] and drives it one frame at a time against a [`World`].
///
/// When the `parallel` feature is enabled, job chunks are dispatched onto a
/// dedicated `rayon::ThreadPool` sized from [`WorldConfig::worker_thread_count`](crate::config::WorldConfig::worker_thread_count),
/// built lazily on first use and rebuilt if that count changes. This keeps
/// several `World`s (and their schedulers) in one process from contending on
/// rayon's global pool.
pub struct JobScheduler {
    schedule: Schedule,
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
    #[cfg(feature = "parallel")]
    pool_threads: usize,
}

impl JobScheduler {
    pub fn new(schedule: Schedule) -> Self {
        JobScheduler {
            schedule,
            #[cfg(feature = "parallel")]
            pool: None,
            #[cfg(feature = "parallel")]
            pool_threads: 0,
        }
    }

    pub fn schedule_mut(&mut self) -> &mut Schedule {
        &mut self.schedule
    }

    /// Build (or rebuild, if `worker_thread_count` changed) this scheduler's
    /// dedicated thread pool. A `worker_thread_count` of `0` tears the pool
    /// down, which `run_stage`/`run_pool` read as "parallel execution disabled".
    #[cfg(feature = "parallel")]
    fn ensure_pool(&mut self, worker_thread_count: usize) {
        if worker_thread_count == self.pool_threads {
            return;
        }
        self.pool = if worker_thread_count == 0 {
            None
        } else {
            rayon::ThreadPoolBuilder::new()
                .num_threads(worker_thread_count)
                .build()
                .map_err(|err| tracing::error!(%err, "failed to build dedicated job scheduler thread pool"))
                .ok()
        };
        self.pool_threads = worker_thread_count;
    }

    /// Run every system once, in schedule order, applying barrier systems'
    /// outstanding command buffers before continuing and flushing whatever
    /// remains once every system has run.
    pub fn run_frame(&mut self, world: &mut World) -> Result<()> {
        #[cfg(feature = "parallel")]
        self.ensure_pool(world.config().worker_thread_count);

        let order = self.schedule.ordered_ids()?;
        let mut outstanding: Vec<CommandBuffer> = Vec::new();

        for id in order {
            self.run_system(id, world, &mut outstanding)?;
        }
        Self::flush(&mut outstanding, world)
    }

    fn run_system(&mut self, id: SystemId, world: &mut World, outstanding: &mut Vec<CommandBuffer>) -> Result<()> {
        let mut ctx = SystemContext::default();
        self.schedule.system_mut(id).run(&mut ctx)?;
        let mut job_specs = ctx.into_jobs();
        tracing::debug!(system = id.0, jobs = job_specs.len(), "running system");

        let groups: Vec<_> = job_specs.iter().map(|spec| spec.group).collect();
        let deps: Vec<_> = job_specs.iter().map(|spec| spec.deps.clone()).collect();
        let graph = DependencyGraph::build(&groups, &deps)?;

        #[cfg(feature = "parallel")]
        let pool = self.pool.as_ref();
        #[cfg(not(feature = "parallel"))]
        let pool = ();

        world.lock();
        let mut produced = Vec::new();
        let stage_result = (|| {
            for stage in graph.stages() {
                produced.extend(Self::run_stage(stage, &mut job_specs, world, pool)?);
            }
            Ok(())
        })();
        world.unlock();
        stage_result?;
        outstanding.append(&mut produced);

        if self.schedule.system_mut(id).flush_command_buffers() {
            tracing::debug!(system = id.0, "barrier: flushing outstanding command buffers");
            Self::flush(outstanding, world)?;
        }
        Ok(())
    }

    fn flush(buffers: &mut Vec<CommandBuffer>, world: &mut World) -> Result<()> {
        for mut buffer in buffers.drain(..) {
            buffer.apply(world)?;
        }
        Ok(())
    }

    fn run_stage(stage: &JobStage, job_specs: &mut [JobSpec], world: &World, pool: PoolRef) -> Result<Vec<CommandBuffer>> {
        let any_blocking = stage.job_indices.iter().any(|&i| job_specs[i].job.blocking());
        if any_blocking || stage.job_indices.len() <= 1 {
            let mut buffers = Vec::with_capacity(stage.job_indices.len());
            for &idx in &stage.job_indices {
                buffers.push(Self::run_job(&mut job_specs[idx], world, pool)?);
            }
            return Ok(buffers);
        }

        let (main_thread_idxs, worker_idxs): (Vec<usize>, Vec<usize>) =
            stage.job_indices.iter().copied().partition(|&i| job_specs[i].job.main_thread());

        let mut buffers = Vec::with_capacity(stage.job_indices.len());

        #[cfg(feature = "parallel")]
        {
            if let Some(thread_pool) = pool.filter(|_| world.config().enable_parallelism && worker_idxs.len() > 1) {
                // SAFETY: `worker_idxs` holds distinct indices into `job_specs`
                // (each job index appears in exactly one stage, once), and every
                // job in this stage has a `ComponentGroup` that does not conflict
                // with any other job in the same stage (`DependencyGraph::build`).
                let specs_ptr = RawSend(job_specs.as_mut_ptr());
                let results: Vec<Result<CommandBuffer>> = thread_pool.install(|| {
                    worker_idxs
                        .par_iter()
                        .map(|&idx| {
                            let spec = unsafe { specs_ptr.add_deref_mut(idx) };
                            Self::run_job(spec, world, Some(thread_pool))
                        })
                        .collect()
                });
                for result in results {
                    buffers.push(result?);
                }
            } else {
                for &idx in &worker_idxs {
                    buffers.push(Self::run_job(&mut job_specs[idx], world, pool)?);
                }
            }
        }
        #[cfg(not(feature = "parallel"))]
        {
            for &idx in &worker_idxs {
                buffers.push(Self::run_job(&mut job_specs[idx], world, pool)?);
            }
        }

        for &idx in &main_thread_idxs {
            buffers.push(Self::run_job(&mut job_specs[idx], world, pool)?);
        }

        Ok(buffers)
    }

    fn run_job(spec: &mut JobSpec, world: &World, pool: PoolRef) -> Result<CommandBuffer> {
        let mut buffer = CommandBuffer::new();
        for (archetype_pool, archetype) in world.pools().iter().zip(world.archetypes()) {
            if archetype_pool.is_empty() || !spec.group.matches(archetype.signature) {
                continue;
            }
            buffer.merge(Self::run_pool(spec, archetype_pool, world, pool)?);
        }
        Ok(buffer)
    }

    fn row_ranges(rows: usize, chunk_size: usize) -> Vec<(usize, usize)> {
        let mut ranges = Vec::new();
        let mut start = 0;
        while start < rows {
            let end = (start + chunk_size).min(rows);
            ranges.push((start, end));
            start = end;
        }
        ranges
    }

    fn run_pool(spec: &mut JobSpec, pool: &ArchetypePool, world: &World, #[allow(unused_variables)] thread_pool: PoolRef) -> Result<CommandBuffer> {
        let rows = pool.size();
        if rows == 0 {
            return Ok(CommandBuffer::new());
        }
        let worker_count = world.config().worker_thread_count.max(1);
        let use_parallel = spec.job.parallel() && world.config().enable_parallelism && rows > worker_count;
        let chunk_size = if use_parallel { rows.div_ceil(worker_count) } else { rows };
        let ranges = Self::row_ranges(rows, chunk_size);

        #[cfg(feature = "parallel")]
        {
            if let Some(tp) = thread_pool.filter(|_| use_parallel && ranges.len() > 1) {
                // SAFETY: chunks of one job partition `pool`'s rows into
                // disjoint, non-overlapping ranges; every `execute` call for a
                // given chunk touches only rows in `[start, end)`.
                let job_ptr = RawSend(spec.job.as_mut() as *mut dyn Job);
                let buffers: Vec<CommandBuffer> = tp.install(|| {
                    ranges
                        .par_iter()
                        .map(|&(start, end)| {
                            let job = unsafe { job_ptr.deref_mut() };
                            Self::run_chunk(job, pool, start, end)
                        })
                        .collect()
                });
                let mut merged = CommandBuffer::new();
                for buffer in buffers {
                    merged.merge(buffer);
                }
                return Ok(merged);
            }
        }

        let mut merged = CommandBuffer::new();
        for (start, end) in ranges {
            merged.merge(Self::run_chunk(spec.job.as_mut(), pool, start, end));
        }
        Ok(merged)
    }

    fn run_chunk(job: &mut dyn Job, pool: &ArchetypePool, start: usize, end: usize) -> CommandBuffer {
        let chunk = JobChunk::new(pool, start, end);
        job.init(&chunk);
        let mut buffer = CommandBuffer::new();
        for row in start..end {
            job.execute(&chunk, row, &mut buffer);
        }
        buffer
    }
}
