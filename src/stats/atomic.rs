//! Lock-free accumulation across execution groups
//!
//! In the record-level regime every execution group finishes with one partial
//! [`StatAccumulator`], and all groups of a launch fold their partial into the
//! same global accumulator concurrently. Nothing here takes a lock:
//!
//! - integer counters use `fetch_add`
//! - float sums use a compare-exchange loop on the `f64` bit pattern
//! - `min`/`max` use a compare-exchange loop that only publishes a value when
//!   it improves the current extremum
//!
//! A plain load/compare/store for the extrema would lose updates when two
//! groups race on the same location, so every read-modify-write goes through
//! a CAS loop.

use super::{StatAccumulator, BUCKETS};
use std::sync::atomic::{AtomicU64, Ordering};

/// `f64` stored as its bit pattern in an `AtomicU64`
#[derive(Debug)]
pub struct AtomicF64 {
    bits: AtomicU64,
}

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self {
            bits: AtomicU64::new(value.to_bits()),
        }
    }

    #[inline]
    pub fn load(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Atomically add `value`, returning the previous value
    #[inline]
    pub fn fetch_add(&self, value: f64) -> f64 {
        self.update(|current| Some(current + value))
    }

    /// Atomically store `min(current, value)`, returning the previous value
    #[inline]
    pub fn fetch_min(&self, value: f64) -> f64 {
        self.update(|current| (value < current).then_some(value))
    }

    /// Atomically store `max(current, value)`, returning the previous value
    #[inline]
    pub fn fetch_max(&self, value: f64) -> f64 {
        self.update(|current| (value > current).then_some(value))
    }

    /// CAS loop; `f` returns `None` when the current value should be kept
    fn update<F>(&self, f: F) -> f64
    where
        F: Fn(f64) -> Option<f64>,
    {
        let mut current = self.bits.load(Ordering::Relaxed);
        loop {
            let Some(next) = f(f64::from_bits(current)) else {
                return f64::from_bits(current);
            };
            match self.bits.compare_exchange_weak(
                current,
                next.to_bits(),
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(previous) => return f64::from_bits(previous),
                Err(actual) => current = actual,
            }
        }
    }
}

#[derive(Debug)]
struct AtomicBucket {
    sum: AtomicF64,
    count: AtomicU64,
}

/// Shared global accumulator updated concurrently by execution groups
#[derive(Debug)]
pub struct AtomicStatAccumulator {
    count: AtomicU64,
    sum: AtomicF64,
    min: AtomicF64,
    max: AtomicF64,
    secondary_sum: AtomicF64,
    secondary_count: AtomicU64,
    buckets: [AtomicBucket; BUCKETS],
    total_records: AtomicU64,
}

impl AtomicStatAccumulator {
    /// Create a global accumulator in the identity state
    pub fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            sum: AtomicF64::new(0.0),
            min: AtomicF64::new(f64::INFINITY),
            max: AtomicF64::new(f64::NEG_INFINITY),
            secondary_sum: AtomicF64::new(0.0),
            secondary_count: AtomicU64::new(0),
            buckets: std::array::from_fn(|_| AtomicBucket {
                sum: AtomicF64::new(0.0),
                count: AtomicU64::new(0),
            }),
            total_records: AtomicU64::new(0),
        }
    }

    /// Atomically combine a group's partial accumulator into this one
    ///
    /// Each field is updated atomically on its own. Once every contributing
    /// group has returned, [`snapshot`](Self::snapshot) equals the sequential
    /// combine of all partials (sums up to rounding).
    pub fn combine_from(&self, partial: &StatAccumulator) {
        if partial.total_records == 0 && partial.count == 0 && partial.secondary_count == 0 {
            return;
        }

        self.count.fetch_add(partial.count, Ordering::Relaxed);
        self.sum.fetch_add(partial.sum);
        self.min.fetch_min(partial.min);
        self.max.fetch_max(partial.max);
        self.secondary_sum.fetch_add(partial.secondary_sum);
        self.secondary_count.fetch_add(partial.secondary_count, Ordering::Relaxed);

        for (global, local) in self.buckets.iter().zip(partial.buckets.iter()) {
            if local.count > 0 {
                global.sum.fetch_add(local.sum);
                global.count.fetch_add(local.count, Ordering::Relaxed);
            }
        }

        self.total_records.fetch_add(partial.total_records, Ordering::Relaxed);
    }

    /// Read the current value as a plain accumulator
    ///
    /// Only meaningful once all writers have finished.
    pub fn snapshot(&self) -> StatAccumulator {
        let mut acc = StatAccumulator {
            count: self.count.load(Ordering::Acquire),
            sum: self.sum.load(),
            min: self.min.load(),
            max: self.max.load(),
            secondary_sum: self.secondary_sum.load(),
            secondary_count: self.secondary_count.load(Ordering::Acquire),
            total_records: self.total_records.load(Ordering::Acquire),
            ..StatAccumulator::IDENTITY
        };
        for (out, bucket) in acc.buckets.iter_mut().zip(self.buckets.iter()) {
            out.sum = bucket.sum.load();
            out.count = bucket.count.load(Ordering::Acquire);
        }
        acc
    }
}

impl Default for AtomicStatAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
