//! Pull-based partitioning
//!
//! Workers claim consecutive index ranges from one shared counter as they
//! finish earlier work. The counter only ever moves forward and every claim
//! is a compare-exchange from the old position to the new one, so no index is
//! handed out twice and none is skipped.

use super::{PartitionPolicy, PartitionStrategy, WorkSchedule};
use crossbeam::utils::CachePadded;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Claim size as a function of `(remaining, workers, chunk_size)`
type ClaimFn = fn(usize, usize, usize) -> usize;

/// Shared claim counter
#[derive(Debug)]
pub struct SharedQueue {
    next: CachePadded<AtomicUsize>,
    n: usize,
    workers: usize,
    chunk_size: usize,
    claim_size: ClaimFn,
}

impl SharedQueue {
    fn new(n: usize, workers: usize, chunk_size: usize, claim_size: ClaimFn) -> Self {
        Self {
            next: CachePadded::new(AtomicUsize::new(0)),
            n,
            workers: workers.max(1),
            chunk_size: chunk_size.max(1),
            claim_size,
        }
    }

    /// Claim the next unclaimed range, `None` once everything is handed out
    pub fn claim(&self) -> Option<Range<usize>> {
        let mut start = self.next.load(Ordering::Relaxed);
        loop {
            if start >= self.n {
                return None;
            }
            let remaining = self.n - start;
            let size = (self.claim_size)(remaining, self.workers, self.chunk_size).clamp(1, remaining);
            let end = start + size;
            match self
                .next
                .compare_exchange_weak(start, end, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return Some(start..end),
                Err(actual) => start = actual,
            }
        }
    }

    /// Total number of items behind the counter
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }
}

fn fixed_claim(_remaining: usize, _workers: usize, chunk_size: usize) -> usize {
    chunk_size
}

fn guided_claim(remaining: usize, workers: usize, chunk_size: usize) -> usize {
    remaining.div_ceil(workers).max(chunk_size)
}

/// Fixed-size pulls of `chunk_size` indices
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicStrategy;

impl PartitionStrategy for DynamicStrategy {
    fn policy(&self) -> PartitionPolicy {
        PartitionPolicy::Dynamic
    }

    fn is_deterministic(&self) -> bool {
        false
    }

    fn schedule(&self, n: usize, workers: usize, chunk_size: usize) -> WorkSchedule {
        WorkSchedule::Shared(SharedQueue::new(n, workers, chunk_size, fixed_claim))
    }
}

/// Shrinking pulls of `max(chunk_size, ceil(remaining / W))` indices
#[derive(Debug, Clone, Copy, Default)]
pub struct GuidedStrategy;

impl PartitionStrategy for GuidedStrategy {
    fn policy(&self) -> PartitionPolicy {
        PartitionPolicy::Guided
    }

    fn is_deterministic(&self) -> bool {
        false
    }

    fn schedule(&self, n: usize, workers: usize, chunk_size: usize) -> WorkSchedule {
        WorkSchedule::Shared(SharedQueue::new(n, workers, chunk_size, guided_claim))
    }
}
