//! Contiguous block partitioning

use super::{Assignment, PartitionPolicy, PartitionStrategy, WorkSchedule};
use std::ops::Range;

/// Worker `r` owns one contiguous run of `ceil(N/W)` indices
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockStrategy;

/// Index range owned by `rank` under block partitioning
///
/// # Arguments
///
/// * `rank` - Worker id in `0..workers`
/// * `n` - Total number of items
/// * `workers` - Number of workers (at least 1)
pub fn block_range(rank: usize, n: usize, workers: usize) -> Range<usize> {
    let per_worker = n.div_ceil(workers.max(1));
    let start = rank.saturating_mul(per_worker).min(n);
    let end = start.saturating_add(per_worker).min(n);
    start..end
}

impl PartitionStrategy for BlockStrategy {
    fn policy(&self) -> PartitionPolicy {
        PartitionPolicy::Block
    }

    fn is_deterministic(&self) -> bool {
        true
    }

    fn schedule(&self, n: usize, workers: usize, _chunk_size: usize) -> WorkSchedule {
        let per_worker = (0..workers).map(|r| block_range(r, n, workers).collect()).collect();
        WorkSchedule::Static(Assignment::from_workers(per_worker))
    }
}
