//! Conflict-based dependency staging for the jobs scheduled by one system.
//!
//! Builds a directed graph from implicit [`ComponentGroup`] conflicts plus
//! explicit job dependencies, then groups it into stages via Kahn's
//! algorithm: every job in a stage is mutually non-conflicting and may run
//! concurrently; stages themselves run in dependency order.

use rustc_hash::FxHashSet;
use std::collections::VecDeque;

use crate::error::{EcsError, Result};
use crate::system::ComponentGroup;

/// A group of job indices that may all execute concurrently.
#[derive(Clone, Debug, Default)]
pub struct JobStage {
    pub job_indices: Vec<usize>,
}

/// Conflict + explicit-dependency graph over one system's scheduled jobs.
pub struct DependencyGraph {
    stages: Vec<JobStage>,
}

impl DependencyGraph {
    /// `groups[i]` is job `i`'s declared access; `explicit_deps[i]` lists
    /// job indices that must complete before job `i` starts, beyond what
    /// conflict analysis alone would require.
    pub fn build(groups: &[ComponentGroup], explicit_deps: &[Vec<usize>]) -> Result<Self> {
        let count = groups.len();
        let mut edges: Vec<FxHashSet<usize>> = vec![FxHashSet::default(); count];
        let mut in_degree = vec![0usize; count];

        for i in 0..count {
            for j in (i + 1)..count {
                if groups[i].conflicts_with(&groups[j]) && edges[i].insert(j) {
                    in_degree[j] += 1;
                }
            }
        }
        for (job, deps) in explicit_deps.iter().enumerate() {
            for &dep in deps {
                if dep == job {
                    continue;
                }
                if edges[dep].insert(job) {
                    in_degree[job] += 1;
                }
            }
        }

        let mut queue: VecDeque<usize> =
            (0..count).filter(|&i| in_degree[i] == 0).collect();
        let mut depth = vec![0usize; count];
        let mut order = Vec::with_capacity(count);
        while let Some(node) = queue.pop_front() {
            order.push(node);
            for &neighbor in &edges[node] {
                in_degree[neighbor] -= 1;
                depth[neighbor] = depth[neighbor].max(depth[node] + 1);
                if in_degree[neighbor] == 0 {
                    queue.push_back(neighbor);
                }
            }
        }
        if order.len() != count {
            return Err(EcsError::SystemCycleDetected);
        }

        let max_depth = depth.iter().copied().max().unwrap_or(0);
        let mut stages: Vec<JobStage> = (0..=max_depth).map(|_| JobStage::default()).collect();
        for &job in &order {
            stages[depth[job]].job_indices.push(job);
        }
        stages.retain(|stage| !stage.job_indices.is_empty());

        Ok(DependencyGraph { stages })
    }

    pub fn stages(&self) -> &[JobStage] {
        &self.stages
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentKind;

    fn kind(n: u16) -> ComponentKind {
        ComponentKind(n)
    }

    #[test]
    fn disjoint_writes_share_a_stage() {
        let a = ComponentGroup::new().writing(kind(0));
        let b = ComponentGroup::new().writing(kind(1));
        let graph = DependencyGraph::build(&[a, b], &[vec![], vec![]]).unwrap();
        assert_eq!(graph.stage_count(), 1);
    }

    #[test]
    fn conflicting_writes_split_into_stages() {
        let a = ComponentGroup::new().writing(kind(0));
        let b = ComponentGroup::new().reading(kind(0));
        let graph = DependencyGraph::build(&[a, b], &[vec![], vec![]]).unwrap();
        assert_eq!(graph.stage_count(), 2);
    }

    #[test]
    fn explicit_dependency_forces_ordering_even_without_conflict() {
        let a = ComponentGroup::new().writing(kind(0));
        let b = ComponentGroup::new().writing(kind(1));
        let graph = DependencyGraph::build(&[a, b], &[vec![], vec![0]]).unwrap();
        assert_eq!(graph.stage_count(), 2);
        assert_eq!(graph.stages()[0].job_indices, vec![0]);
        assert_eq!(graph.stages()[1].job_indices, vec![1]);
    }

    #[test]
    fn self_dependency_cycle_is_detected() {
        let a = ComponentGroup::new().writing(kind(0));
        let b = ComponentGroup::new().writing(kind(0));
        // b depends on a, and a (spuriously) depends on b: a cycle.
        let result = DependencyGraph::build(&[a, b], &[vec![1], vec![]]);
        assert!(matches!(result, Err(EcsError::SystemCycleDetected)));
    }
}
