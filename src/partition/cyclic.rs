//! Round-robin partitioning

use super::{Assignment, PartitionPolicy, PartitionStrategy, WorkSchedule};

/// Worker `r` owns every `W`-th index starting at `r`
#[derive(Debug, Clone, Copy, Default)]
pub struct CyclicStrategy;

impl PartitionStrategy for CyclicStrategy {
    fn policy(&self) -> PartitionPolicy {
        PartitionPolicy::Cyclic
    }

    fn is_deterministic(&self) -> bool {
        true
    }

    fn schedule(&self, n: usize, workers: usize, _chunk_size: usize) -> WorkSchedule {
        let per_worker = (0..workers)
            .map(|r| (r..n).step_by(workers).collect())
            .collect();
        WorkSchedule::Static(Assignment::from_workers(per_worker))
    }
}
