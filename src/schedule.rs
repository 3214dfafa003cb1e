//! System registration, job collection, and system-level ordering.
//!
//! Systems run once per frame in a deterministic order built from explicit
//! `order_after`/`order_before` constraints (falling back to registration
//! order when unconstrained). Each system's own jobs are staged separately
//! by [`crate::dependency::DependencyGraph`] from their `ComponentGroup`
//! conflicts.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use crate::error::{EcsError, Result};
use crate::system::{ComponentGroup, Job, JobHandle};

/// One job queued by a system's `run`, awaiting conflict staging.
pub struct JobSpec {
    pub group: ComponentGroup,
    pub job: Box<dyn Job>,
    pub deps: Vec<usize>,
}

/// Passed to [`System::run`]; collects the jobs a system wants to schedule
/// this frame.
#[derive(Default)]
pub struct SystemContext {
    jobs: Vec<JobSpec>,
}

impl SystemContext {
    pub fn schedule(&mut self, group: ComponentGroup, job: impl Job + 'static) -> JobHandle {
        self.schedule_after(group, job, &[])
    }

    pub fn schedule_after(&mut self, group: ComponentGroup, job: impl Job + 'static, dependencies: &[JobHandle]) -> JobHandle {
        let idx = self.jobs.len();
        let deps = dependencies.iter().map(|h| h.0 as usize).collect();
        self.jobs.push(JobSpec { group, job: Box::new(job), deps });
        JobHandle(idx as u32)
    }

    pub(crate) fn into_jobs(self) -> Vec<JobSpec> {
        self.jobs
    }
}

/// A unit of per-frame work that schedules jobs against the world.
pub trait System: Send {
    fn name(&self) -> &'static str;

    fn run(&mut self, ctx: &mut SystemContext) -> Result<()>;

    /// Marks a barrier: every command buffer outstanding from this system
    /// and earlier is applied before any later system's jobs run.
    fn flush_command_buffers(&self) -> bool {
        false
    }
}

pub type BoxedSystem = Box<dyn System>;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SystemId(pub u32);

#[derive(Default)]
struct OrderingConstraint {
    before: Vec<String>,
    after: Vec<String>,
}

/// Registered systems plus the ordering constraints between them.
#[derive(Default)]
pub struct Schedule {
    systems: Vec<BoxedSystem>,
    constraints: FxHashMap<String, OrderingConstraint>,
    order: Option<Vec<SystemId>>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_system(&mut self, system: BoxedSystem) -> SystemId {
        let id = SystemId(self.systems.len() as u32);
        self.systems.push(system);
        self.order = None;
        id
    }

    pub fn with_system(mut self, system: BoxedSystem) -> Self {
        self.add_system(system);
        self
    }

    /// `system` must run before the system named `before`.
    pub fn order_before(&mut self, system: &str, before: &str) {
        self.constraints.entry(system.to_string()).or_default().before.push(before.to_string());
        self.order = None;
    }

    /// `system` must run after the system named `after`.
    pub fn order_after(&mut self, system: &str, after: &str) {
        self.constraints.entry(system.to_string()).or_default().after.push(after.to_string());
        self.order = None;
    }

    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    fn ensure_order(&mut self) -> Result<()> {
        if self.order.is_some() {
            return Ok(());
        }
        let count = self.systems.len();
        let name_index: FxHashMap<&str, usize> =
            self.systems.iter().enumerate().map(|(i, s)| (s.name(), i)).collect();

        let mut edges: Vec<Vec<usize>> = vec![Vec::new(); count];
        let mut in_degree = vec![0usize; count];
        for (name, constraint) in &self.constraints {
            let Some(&from) = name_index.get(name.as_str()) else { continue };
            for before in &constraint.before {
                if let Some(&to) = name_index.get(before.as_str()) {
                    edges[from].push(to);
                    in_degree[to] += 1;
                }
            }
            for after in &constraint.after {
                if let Some(&to) = name_index.get(after.as_str()) {
                    edges[to].push(from);
                    in_degree[from] += 1;
                }
            }
        }

        let mut queue: VecDeque<usize> = (0..count).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(count);
        while let Some(node) = queue.pop_front() {
            order.push(SystemId(node as u32));
            for &neighbor in &edges[node] {
                in_degree[neighbor] -= 1;
                if in_degree[neighbor] == 0 {
                    queue.push_back(neighbor);
                }
            }
        }
        if order.len() != count {
            return Err(EcsError::SystemCycleDetected);
        }
        self.order = Some(order);
        Ok(())
    }

    pub(crate) fn ordered_ids(&mut self) -> Result<Vec<SystemId>> {
        self.ensure_order()?;
        Ok(self.order.clone().unwrap())
    }

    pub(crate) fn system_mut(&mut self, id: SystemId) -> &mut BoxedSystem {
        &mut self.systems[id.0 as usize]
    }
}
