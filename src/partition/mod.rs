//! Work partitioning
//!
//! The planner splits `N` pre-enumerated work items across `W` workers. The
//! policy is a closed enumeration; each variant maps to a
//! [`PartitionStrategy`] through a constant table, so adding a policy means
//! adding a strategy and a table entry.
//!
//! # Policies
//!
//! - **block**: worker `r` owns `[r*ceil(N/W), min((r+1)*ceil(N/W), N))`.
//!   Trailing workers may own nothing.
//! - **cyclic**: worker `r` owns `r, r+W, r+2W, ...` below `N`.
//! - **dynamic**: workers pull `chunk_size` consecutive indices at a time
//!   from a shared counter.
//! - **guided**: like dynamic, but each pull claims
//!   `max(chunk_size, ceil(remaining / W))` indices.
//!
//! Block and cyclic ownership is a pure function of `(r, N, W)`. Dynamic and
//! guided only guarantee that the union of all claims is a partition of
//! `0..N`: every index is claimed exactly once.
//!
//! # Example
//!
//! ```
//! use wxreduce::partition::{PartitionPlanner, PartitionPolicy};
//!
//! let planner = PartitionPlanner::new(PartitionPolicy::Block, 4, 1);
//! let assignment = planner.assignment(10).unwrap();
//! assert_eq!(assignment.worker(0), &[0, 1, 2]);
//! assert_eq!(assignment.worker(3), &[9]);
//! assert!(assignment.is_partition(10));
//! ```

pub mod block;
pub mod cyclic;
pub mod dynamic;

use clap::ValueEnum;
use dynamic::SharedQueue;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Partition policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PartitionPolicy {
    Block,
    Cyclic,
    Dynamic,
    Guided,
}

/// Strategy table, indexed by policy discriminant
const STRATEGIES: [&dyn PartitionStrategy; 4] = [
    &block::BlockStrategy,
    &cyclic::CyclicStrategy,
    &dynamic::DynamicStrategy,
    &dynamic::GuidedStrategy,
];

impl PartitionPolicy {
    /// The strategy implementing this policy
    pub fn strategy(self) -> &'static dyn PartitionStrategy {
        STRATEGIES[self as usize]
    }

    /// True when ownership is a pure function of `(worker, N, W)`
    pub fn is_deterministic(self) -> bool {
        self.strategy().is_deterministic()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PartitionPolicy::Block => "block",
            PartitionPolicy::Cyclic => "cyclic",
            PartitionPolicy::Dynamic => "dynamic",
            PartitionPolicy::Guided => "guided",
        }
    }
}

impl fmt::Display for PartitionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One partitioning strategy
pub trait PartitionStrategy {
    fn policy(&self) -> PartitionPolicy;

    /// Whether [`schedule`](Self::schedule) always yields a static assignment
    fn is_deterministic(&self) -> bool;

    /// Build the schedule for `n` items over `workers` workers
    ///
    /// `workers` and `chunk_size` are at least 1.
    fn schedule(&self, n: usize, workers: usize, chunk_size: usize) -> WorkSchedule;
}

/// Mapping from worker id to the ordered item indices it owns
///
/// Produced once and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    per_worker: Vec<Vec<usize>>,
}

impl Assignment {
    /// Build from per-worker index lists
    pub fn from_workers(per_worker: Vec<Vec<usize>>) -> Self {
        Self { per_worker }
    }

    pub fn num_workers(&self) -> usize {
        self.per_worker.len()
    }

    /// Indices owned by `worker`, empty if the worker is out of range
    pub fn worker(&self, worker: usize) -> &[usize] {
        self.per_worker.get(worker).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of items owned by each worker
    pub fn counts(&self) -> Vec<usize> {
        self.per_worker.iter().map(Vec::len).collect()
    }

    /// True when the assignment is disjoint and covers exactly `0..n`
    pub fn is_partition(&self, n: usize) -> bool {
        let mut seen = vec![false; n];
        for &index in self.per_worker.iter().flatten() {
            match seen.get_mut(index) {
                Some(slot) if !*slot => *slot = true,
                _ => return false,
            }
        }
        seen.into_iter().all(|s| s)
    }
}

/// Work schedule handed to a pool of workers
#[derive(Debug)]
pub enum WorkSchedule {
    /// Ownership fixed before any worker starts
    Static(Assignment),
    /// Ownership decided at run time by pulling from a shared counter
    Shared(SharedQueue),
}

impl WorkSchedule {
    /// Iterator over the indices `worker` will process
    ///
    /// For a shared schedule every call draws from the same counter, so call
    /// it once per worker.
    pub fn worker_iter(&self, worker: usize) -> WorkerIndices<'_> {
        match self {
            WorkSchedule::Static(assignment) => WorkerIndices::Static(assignment.worker(worker).iter()),
            WorkSchedule::Shared(queue) => WorkerIndices::Shared {
                queue,
                current: 0..0,
            },
        }
    }

    /// The static assignment, if ownership was fixed up front
    pub fn assignment(&self) -> Option<&Assignment> {
        match self {
            WorkSchedule::Static(a) => Some(a),
            WorkSchedule::Shared(_) => None,
        }
    }
}

/// Per-worker index iterator
pub enum WorkerIndices<'a> {
    Static(std::slice::Iter<'a, usize>),
    Shared {
        queue: &'a SharedQueue,
        current: Range<usize>,
    },
}

impl Iterator for WorkerIndices<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        match self {
            WorkerIndices::Static(iter) => iter.next().copied(),
            WorkerIndices::Shared { queue, current } => loop {
                if let Some(index) = current.next() {
                    return Some(index);
                }
                *current = queue.claim()?;
            },
        }
    }
}

/// Assigns work items to workers under a policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionPlanner {
    policy: PartitionPolicy,
    workers: usize,
    chunk_size: usize,
}

impl PartitionPlanner {
    /// Create a planner; zero workers or chunk size are raised to 1
    pub fn new(policy: PartitionPolicy, workers: usize, chunk_size: usize) -> Self {
        Self {
            policy,
            workers: workers.max(1),
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn policy(&self) -> PartitionPolicy {
        self.policy
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Build the run's schedule for `n` items
    pub fn plan(&self, n: usize) -> WorkSchedule {
        self.policy.strategy().schedule(n, self.workers, self.chunk_size)
    }

    /// The static assignment for `n` items, `None` for pull-based policies
    pub fn assignment(&self, n: usize) -> Option<Assignment> {
        match self.plan(n) {
            WorkSchedule::Static(a) => Some(a),
            WorkSchedule::Shared(_) => None,
        }
    }
}
