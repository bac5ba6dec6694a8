//! Shared helpers for unit tests

use crate::source::Record;
use crate::stats::{StatAccumulator, BUCKETS};
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Relative/absolute float comparison
pub fn isclose(actual: f64, expected: f64, rtol: f64, atol: f64) -> bool {
    if actual == expected {
        return true;
    }
    (actual - expected).abs() <= atol + rtol * expected.abs()
}

/// Reproducible synthetic record stream
///
/// Roughly one record in ten is missing its primary value, one in five its
/// secondary value, and a few carry an out-of-range bucket key.
pub fn synthetic_records(n: usize, seed: u64) -> Vec<Record> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let primary = (rng.gen_range(0..10) != 0).then(|| rng.gen_range(-40.0..45.0));
            let secondary = (rng.gen_range(0..5) != 0).then(|| rng.gen_range(0.0..80.0));
            let bucket = match rng.gen_range(0..20) {
                0 => None,
                1 => Some(-1),
                2 => Some(BUCKETS as i32),
                _ => Some(rng.gen_range(0..BUCKETS as i32)),
            };
            Record {
                primary,
                secondary,
                bucket,
            }
        })
        .collect()
}

/// Accumulator built from a short random record stream
pub fn random_accumulator(rng: &mut Xoshiro256PlusPlus) -> StatAccumulator {
    let mut acc = StatAccumulator::new();
    let n = rng.gen_range(0..20);
    for _ in 0..n {
        acc.total_records += 1;
        if rng.gen_bool(0.8) {
            let bucket = rng.gen_range(0..BUCKETS + 2);
            acc.add_primary(rng.gen_range(-40.0..45.0), Some(bucket));
        }
        if rng.gen_bool(0.5) {
            acc.add_secondary(rng.gen_range(0.0..80.0));
        }
    }
    acc
}
