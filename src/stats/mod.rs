//! Per-entity statistics
//!
//! The [`StatAccumulator`] is the single aggregate shared by every backend.
//! Thread pools, distributed nodes and block-parallel kernels all produce
//! accumulators, and all of them merge partial results through the same
//! [`StatAccumulator::combine`] operator.
//!
//! # Combine semantics
//!
//! - `count`, `secondary_count`, bucket counts and `total_records` add
//! - `sum`, `secondary_sum` and bucket sums add (associative up to rounding)
//! - `min` and `max` take the minimum and maximum
//!
//! The identity element has zero counts and sums, `min = +inf` and
//! `max = -inf`, so combining with an accumulator that saw nothing is a no-op.
//!
//! # Example
//!
//! ```
//! use wxreduce::stats::StatAccumulator;
//!
//! let mut a = StatAccumulator::new();
//! a.add_primary(10.0, Some(0));
//!
//! let mut b = StatAccumulator::new();
//! b.add_primary(20.0, Some(0));
//! b.add_primary(30.0, None);
//!
//! let c = a.combine(&b);
//! assert_eq!(c.count, 3);
//! assert_eq!(c.sum, 60.0);
//! assert_eq!(c.min, 10.0);
//! assert_eq!(c.max, 30.0);
//! assert_eq!(c.buckets[0].count, 2);
//! ```

pub mod aggregator;
pub mod atomic;

use serde::{Deserialize, Serialize};

/// Number of categorical buckets (one per calendar month)
pub const BUCKETS: usize = 12;

/// Partial sum for one categorical bucket
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bucket {
    pub sum: f64,
    pub count: u64,
}

impl Bucket {
    /// Empty bucket
    pub const EMPTY: Bucket = Bucket { sum: 0.0, count: 0 };

    /// Mean of the bucket, or `None` if nothing was added
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }

    #[inline]
    fn combine(&self, other: &Bucket) -> Bucket {
        Bucket {
            sum: self.sum + other.sum,
            count: self.count + other.count,
        }
    }
}

/// Summary statistics for one entity
///
/// The primary metric (temperature) feeds `count`, `sum`, `min`, `max` and the
/// buckets. The secondary metric (precipitation) has its own independent
/// count. `total_records` counts every record seen, including ones that
/// contributed to neither metric.
///
/// # Invariants
///
/// - `min <= max` whenever `count > 0`
/// - `min = +inf` and `max = -inf` whenever `count == 0`
/// - the sum of all bucket counts never exceeds `count`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatAccumulator {
    /// Records that carried a primary value
    pub count: u64,

    pub sum: f64,
    pub min: f64,
    pub max: f64,

    pub secondary_sum: f64,
    pub secondary_count: u64,

    /// Primary-metric partial sums keyed by bucket index `0..BUCKETS`
    pub buckets: [Bucket; BUCKETS],

    /// Every record seen for this entity
    pub total_records: u64,
}

impl StatAccumulator {
    /// The identity element of [`combine`](Self::combine)
    pub const IDENTITY: StatAccumulator = StatAccumulator {
        count: 0,
        sum: 0.0,
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
        secondary_sum: 0.0,
        secondary_count: 0,
        buckets: [Bucket::EMPTY; BUCKETS],
        total_records: 0,
    };

    /// Create an accumulator in the identity state
    pub fn new() -> Self {
        Self::IDENTITY
    }

    /// Add one primary value
    ///
    /// `bucket` is only honoured when it lies in `0..BUCKETS`; anything else
    /// is dropped from bucket accumulation while the value still counts
    /// towards the top-level statistics.
    #[inline]
    pub fn add_primary(&mut self, value: f64, bucket: Option<usize>) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);

        if let Some(b) = bucket.and_then(|i| self.buckets.get_mut(i)) {
            b.sum += value;
            b.count += 1;
        }
    }

    /// Add one secondary value
    #[inline]
    pub fn add_secondary(&mut self, value: f64) {
        self.secondary_sum += value;
        self.secondary_count += 1;
    }

    /// Combine two accumulators into a new one
    ///
    /// Commutative and associative for counts, `min` and `max`. Sums are
    /// associative only up to floating point rounding.
    pub fn combine(&self, other: &StatAccumulator) -> StatAccumulator {
        let mut out = *self;
        out.merge(other);
        out
    }

    /// Combine `other` into `self` in place
    pub fn merge(&mut self, other: &StatAccumulator) {
        self.count += other.count;
        self.sum += other.sum;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.secondary_sum += other.secondary_sum;
        self.secondary_count += other.secondary_count;
        for (mine, theirs) in self.buckets.iter_mut().zip(other.buckets.iter()) {
            *mine = mine.combine(theirs);
        }
        self.total_records += other.total_records;
    }

    /// True when no record has contributed a primary value
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Mean of the primary metric
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }

    /// Minimum primary value, `None` when nothing contributed
    pub fn min_value(&self) -> Option<f64> {
        (self.count > 0).then_some(self.min)
    }

    /// Maximum primary value, `None` when nothing contributed
    pub fn max_value(&self) -> Option<f64> {
        (self.count > 0).then_some(self.max)
    }

    /// Mean of one bucket
    pub fn bucket_mean(&self, bucket: usize) -> Option<f64> {
        self.buckets.get(bucket).and_then(Bucket::mean)
    }
}

impl Default for StatAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{isclose, random_accumulator};
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn exact_fields_eq(a: &StatAccumulator, b: &StatAccumulator) -> bool {
        a.count == b.count
            && a.min == b.min
            && a.max == b.max
            && a.secondary_count == b.secondary_count
            && a.total_records == b.total_records
            && a.buckets.iter().zip(b.buckets.iter()).all(|(x, y)| x.count == y.count)
    }

    fn sums_close(a: &StatAccumulator, b: &StatAccumulator) -> bool {
        isclose(a.sum, b.sum, 1e-6, 1e-9)
            && isclose(a.secondary_sum, b.secondary_sum, 1e-6, 1e-9)
            && a.buckets
                .iter()
                .zip(b.buckets.iter())
                .all(|(x, y)| isclose(x.sum, y.sum, 1e-6, 1e-9))
    }

    #[test]
    fn test_new_is_identity() {
        let acc = StatAccumulator::new();
        assert_eq!(acc.count, 0);
        assert_eq!(acc.sum, 0.0);
        assert_eq!(acc.min, f64::INFINITY);
        assert_eq!(acc.max, f64::NEG_INFINITY);
        assert_eq!(acc.total_records, 0);
        assert!(acc.is_empty());
        assert_eq!(acc.mean(), None);
        assert_eq!(acc.min_value(), None);
        assert_eq!(acc, StatAccumulator::default());
    }

    #[test]
    fn test_add_primary() {
        let mut acc = StatAccumulator::new();
        acc.add_primary(5.0, Some(3));
        acc.add_primary(-2.0, Some(3));
        acc.add_primary(7.0, None);

        assert_eq!(acc.count, 3);
        assert_eq!(acc.sum, 10.0);
        assert_eq!(acc.min, -2.0);
        assert_eq!(acc.max, 7.0);
        assert_eq!(acc.buckets[3].count, 2);
        assert_eq!(acc.bucket_mean(3), Some(1.5));
        assert_eq!(acc.bucket_mean(4), None);
    }

    #[test]
    fn test_out_of_range_bucket_dropped() {
        let mut acc = StatAccumulator::new();
        acc.add_primary(4.0, Some(12));
        acc.add_primary(6.0, Some(99));

        assert_eq!(acc.count, 2);
        assert_eq!(acc.sum, 10.0);
        let bucket_total: u64 = acc.buckets.iter().map(|b| b.count).sum();
        assert_eq!(bucket_total, 0);
        assert_eq!(acc.bucket_mean(12), None);
    }

    #[test]
    fn test_add_secondary_independent() {
        let mut acc = StatAccumulator::new();
        acc.add_secondary(1.5);
        acc.add_secondary(2.5);

        assert_eq!(acc.secondary_count, 2);
        assert_eq!(acc.secondary_sum, 4.0);
        assert_eq!(acc.count, 0);
        assert!(acc.is_empty());
    }

    #[test]
    fn test_combine_two_workers() {
        // [10] on one worker, [20, 30] on another
        let mut a = StatAccumulator::new();
        a.add_primary(10.0, None);
        let mut b = StatAccumulator::new();
        b.add_primary(20.0, None);
        b.add_primary(30.0, None);

        let c = a.combine(&b);
        assert_eq!(c.count, 3);
        assert_eq!(c.sum, 60.0);
        assert_eq!(c.min, 10.0);
        assert_eq!(c.max, 30.0);
    }

    #[test]
    fn test_combine_identity() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        for _ in 0..50 {
            let a = random_accumulator(&mut rng);
            assert_eq!(a.combine(&StatAccumulator::IDENTITY), a);
            assert_eq!(StatAccumulator::IDENTITY.combine(&a), a);
        }
    }

    #[test]
    fn test_combine_commutative() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);
        for _ in 0..50 {
            let a = random_accumulator(&mut rng);
            let b = random_accumulator(&mut rng);
            let ab = a.combine(&b);
            let ba = b.combine(&a);
            assert!(exact_fields_eq(&ab, &ba));
            assert!(sums_close(&ab, &ba));
        }
    }

    #[test]
    fn test_combine_associative() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(13);
        for _ in 0..50 {
            let a = random_accumulator(&mut rng);
            let b = random_accumulator(&mut rng);
            let c = random_accumulator(&mut rng);
            let left = a.combine(&b).combine(&c);
            let right = a.combine(&b.combine(&c));
            assert!(exact_fields_eq(&left, &right));
            assert!(sums_close(&left, &right));
        }
    }

    #[test]
    fn test_merge_matches_combine() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(17);
        let a = random_accumulator(&mut rng);
        let b = random_accumulator(&mut rng);

        let mut merged = a;
        merged.merge(&b);
        assert_eq!(merged, a.combine(&b));
    }

    #[test]
    fn test_serde_roundtrip_keeps_sentinels() {
        let acc = StatAccumulator::new();
        let bytes = rmp_serde::to_vec(&acc).unwrap();
        let back: StatAccumulator = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(back.min, f64::INFINITY);
        assert_eq!(back.max, f64::NEG_INFINITY);
    }
}
