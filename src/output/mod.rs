//! Reporting
//!
//! Turns the ordered result collection into a human-readable text report and
//! an optional JSON document. Rankings are stable: ties keep collection order.

pub mod json;
pub mod text;

use crate::collector::EntityResult;
use crate::config::Backend;
use std::cmp::Ordering;
use std::time::Duration;

/// Run metadata shown in the performance section of both reports
#[derive(Debug, Clone, Copy)]
pub struct RunInfo {
    pub backend: Backend,
    pub parallelism: usize,
    pub elapsed: Duration,
}

impl RunInfo {
    pub fn new(backend: Backend, parallelism: usize, elapsed: Duration) -> Self {
        Self {
            backend,
            parallelism,
            elapsed,
        }
    }

    /// Entities reduced per wall-clock second
    pub fn entities_per_sec(&self, entities: usize) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            entities as f64 / secs
        } else {
            0.0
        }
    }
}

/// Entities ranked by mean primary metric, hottest first
///
/// Entities without a primary observation are excluded.
pub fn hottest(results: &[EntityResult], top_n: usize) -> Vec<(&EntityResult, f64)> {
    rank(results, top_n, |r| r.stats.mean(), |a, b| b.total_cmp(a))
}

/// Entities ranked by mean primary metric, coldest first
pub fn coldest(results: &[EntityResult], top_n: usize) -> Vec<(&EntityResult, f64)> {
    rank(results, top_n, |r| r.stats.mean(), |a, b| a.total_cmp(b))
}

/// Entities ranked by total secondary metric, wettest first
pub fn wettest(results: &[EntityResult], top_n: usize) -> Vec<(&EntityResult, f64)> {
    rank(results, top_n, |r| Some(r.stats.secondary_sum), |a, b| b.total_cmp(a))
}

fn rank<K, C>(results: &[EntityResult], top_n: usize, key: K, cmp: C) -> Vec<(&EntityResult, f64)>
where
    K: Fn(&EntityResult) -> Option<f64>,
    C: Fn(&f64, &f64) -> Ordering,
{
    let mut ranked: Vec<(&EntityResult, f64)> = results
        .iter()
        .filter_map(|r| key(r).map(|k| (r, k)))
        .collect();
    // sort_by is stable, so equal keys stay in collection order
    ranked.sort_by(|a, b| cmp(&a.1, &b.1));
    ranked.truncate(top_n);
    ranked
}
