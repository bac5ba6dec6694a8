//! Aggregate totals across entities
//!
//! Once the ordered result collection is complete, the reporting layer needs
//! run-wide totals. These are computed as one more reduction with the same
//! combine operator used everywhere else: every entity's accumulator is
//! folded into a single run-wide accumulator.
//!
//! # Example
//!
//! ```
//! use wxreduce::stats::StatAccumulator;
//! use wxreduce::stats::aggregator::StatisticsAggregator;
//!
//! let mut a = StatAccumulator::new();
//! a.total_records = 2;
//! a.add_primary(10.0, None);
//!
//! let mut b = StatAccumulator::new();
//! b.total_records = 1;
//! b.add_primary(20.0, None);
//!
//! let mut aggregator = StatisticsAggregator::new();
//! aggregator.add(&a);
//! aggregator.add(&b);
//!
//! let totals = aggregator.totals();
//! assert_eq!(totals.entities, 2);
//! assert_eq!(totals.total_records, 3);
//! assert_eq!(totals.total_primary_count, 2);
//! assert_eq!(totals.total_primary_sum, 30.0);
//! ```

use super::StatAccumulator;
use crate::collector::EntityResult;
use serde::{Deserialize, Serialize};

/// Run-wide totals handed to the reporting layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalTotals {
    /// Number of entities in the collection
    pub entities: usize,
    pub total_records: u64,
    pub total_primary_count: u64,
    pub total_primary_sum: f64,
    pub total_secondary_sum: f64,
}

impl GlobalTotals {
    /// Mean of the primary metric over every contributing record
    pub fn global_mean(&self) -> Option<f64> {
        if self.total_primary_count == 0 {
            None
        } else {
            Some(self.total_primary_sum / self.total_primary_count as f64)
        }
    }
}

/// Folds per-entity accumulators into run-wide totals
///
/// # Usage
///
/// 1. Create aggregator with `new()`
/// 2. Feed each entity with `add()`
/// 3. Read the result with `totals()` or `aggregate()`
#[derive(Debug, Clone)]
pub struct StatisticsAggregator {
    aggregate: StatAccumulator,
    entities: usize,
}

impl StatisticsAggregator {
    pub fn new() -> Self {
        Self {
            aggregate: StatAccumulator::new(),
            entities: 0,
        }
    }

    /// Add one entity's final accumulator
    pub fn add(&mut self, stats: &StatAccumulator) {
        self.aggregate.merge(stats);
        self.entities += 1;
    }

    /// Number of entities added so far
    pub fn num_entities(&self) -> usize {
        self.entities
    }

    /// The combined accumulator over every entity
    pub fn aggregate(&self) -> &StatAccumulator {
        &self.aggregate
    }

    pub fn totals(&self) -> GlobalTotals {
        GlobalTotals {
            entities: self.entities,
            total_records: self.aggregate.total_records,
            total_primary_count: self.aggregate.count,
            total_primary_sum: self.aggregate.sum,
            total_secondary_sum: self.aggregate.secondary_sum,
        }
    }
}

impl Default for StatisticsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute run-wide totals over an ordered result collection
pub fn compute_totals(results: &[EntityResult]) -> GlobalTotals {
    let mut aggregator = StatisticsAggregator::new();
    for result in results {
        aggregator.add(&result.stats);
    }
    aggregator.totals()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(name: &str, values: &[f64], records: u64) -> EntityResult {
        let mut stats = StatAccumulator::new();
        stats.total_records = records;
        for v in values {
            stats.add_primary(*v, None);
        }
        EntityResult {
            entity: name.to_string(),
            stats,
        }
    }

    #[test]
    fn test_aggregator_new() {
        let aggregator = StatisticsAggregator::new();
        assert_eq!(aggregator.num_entities(), 0);
        assert_eq!(*aggregator.aggregate(), StatAccumulator::IDENTITY);
        assert_eq!(aggregator.totals().global_mean(), None);
    }

    #[test]
    fn test_compute_totals() {
        let results = vec![
            entity("Aberdeen", &[1.0, 3.0], 3),
            entity("Bergen", &[], 4),
            entity("Cadiz", &[20.0], 1),
        ];
        let totals = compute_totals(&results);

        assert_eq!(totals.entities, 3);
        assert_eq!(totals.total_records, 8);
        assert_eq!(totals.total_primary_count, 3);
        assert_eq!(totals.total_primary_sum, 24.0);
        assert_eq!(totals.global_mean(), Some(8.0));
    }

    #[test]
    fn test_compute_totals_empty() {
        let totals = compute_totals(&[]);
        assert_eq!(totals.entities, 0);
        assert_eq!(totals.total_records, 0);
        assert_eq!(totals.global_mean(), None);
    }

    #[test]
    fn test_aggregate_keeps_extrema() {
        let mut aggregator = StatisticsAggregator::new();
        aggregator.add(&entity("a", &[5.0, -3.0], 2).stats);
        aggregator.add(&entity("b", &[], 0).stats);
        aggregator.add(&entity("c", &[12.0], 1).stats);

        let agg = aggregator.aggregate();
        assert_eq!(agg.min, -3.0);
        assert_eq!(agg.max, 12.0);
    }
}
