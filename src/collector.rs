//! Ordered result collection
//!
//! Every backend ends with many independent sources (worker threads or
//! distributed nodes) delivering finished per-entity results to one
//! coordinating point. The [`ResultCollector`] places each result at
//!
//! ```text
//! slot = offset(source) + local_index
//! ```
//!
//! where `offset` is the exclusive prefix sum of the per-source counts. The
//! final order therefore depends only on the count vector, never on which
//! source finished first. Sources with zero results occupy zero slots.
//!
//! Slots are write-once cells, so many sources can place results into the
//! same collector concurrently through a shared reference.
//!
//! # Example
//!
//! ```
//! use wxreduce::collector::{exclusive_prefix_sum, ResultCollector};
//!
//! assert_eq!(exclusive_prefix_sum(&[0, 5, 3, 0]), vec![0, 0, 5, 8]);
//!
//! let collector = ResultCollector::new(vec![0, 5, 3, 0]).unwrap();
//! assert_eq!(collector.total_slots(), 8);
//! ```

use crate::error::ReduceError;
use crate::stats::StatAccumulator;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Final statistics for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityResult {
    pub entity: String,
    pub stats: StatAccumulator,
}

impl EntityResult {
    pub fn new(entity: impl Into<String>, stats: StatAccumulator) -> Self {
        Self {
            entity: entity.into(),
            stats,
        }
    }
}

/// Exclusive prefix sum of per-source counts
pub fn exclusive_prefix_sum(counts: &[usize]) -> Vec<usize> {
    counts
        .iter()
        .scan(0usize, |running, &count| {
            let offset = *running;
            *running += count;
            Some(offset)
        })
        .collect()
}

/// Write-once, offset-ordered result buffer
#[derive(Debug)]
pub struct ResultCollector {
    counts: Vec<usize>,
    offsets: Vec<usize>,
    slots: Vec<OnceLock<EntityResult>>,
}

impl ResultCollector {
    /// Create a collector for sources announcing `counts` results each
    ///
    /// # Errors
    ///
    /// [`ReduceError::ResourceExhausted`] if the slot buffer cannot be
    /// allocated. The run cannot continue without every slot.
    pub fn new(counts: Vec<usize>) -> Result<Self, ReduceError> {
        let offsets = exclusive_prefix_sum(&counts);
        let total: usize = counts.iter().sum();

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(total)
            .map_err(|cause| ReduceError::ResourceExhausted { slots: total, cause })?;
        slots.resize_with(total, OnceLock::new);

        Ok(Self {
            counts,
            offsets,
            slots,
        })
    }

    /// Collector with one source per work item
    ///
    /// Used by backends that schedule item by item: the slot of an item is its
    /// index, whichever worker processed it.
    pub fn per_item(n: usize) -> Result<Self, ReduceError> {
        let mut counts = Vec::new();
        counts
            .try_reserve_exact(n)
            .map_err(|cause| ReduceError::ResourceExhausted { slots: n, cause })?;
        counts.resize(n, 1);
        Self::new(counts)
    }

    pub fn num_sources(&self) -> usize {
        self.counts.len()
    }

    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Starting slot of each source
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn total_slots(&self) -> usize {
        self.slots.len()
    }

    /// Slot index for `(source_id, local_index)`
    pub fn slot_of(&self, source_id: usize, local_index: usize) -> Result<usize, ReduceError> {
        let count = *self.counts.get(source_id).ok_or(ReduceError::UnknownSource {
            source_id,
            sources: self.counts.len(),
        })?;
        if local_index >= count {
            return Err(ReduceError::SlotOutOfRange {
                source_id,
                local_index,
                count,
            });
        }
        Ok(self.offsets[source_id] + local_index)
    }

    /// Place one result
    pub fn place(&self, source_id: usize, local_index: usize, result: EntityResult) -> Result<(), ReduceError> {
        let slot = self.slot_of(source_id, local_index)?;
        self.slots[slot]
            .set(result)
            .map_err(|_| ReduceError::SlotAlreadyFilled { slot })
    }

    /// Place every result of one source, in local order
    ///
    /// The number of results must equal the count the source announced.
    pub fn place_all(&self, source_id: usize, results: Vec<EntityResult>) -> Result<(), ReduceError> {
        let expected = *self.counts.get(source_id).ok_or(ReduceError::UnknownSource {
            source_id,
            sources: self.counts.len(),
        })?;
        if results.len() != expected {
            return Err(ReduceError::CountMismatch {
                source_id,
                expected,
                actual: results.len(),
            });
        }
        for (local_index, result) in results.into_iter().enumerate() {
            self.place(source_id, local_index, result)?;
        }
        Ok(())
    }

    /// Number of slots written so far
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|s| s.get().is_some()).count()
    }

    /// Consume the collector into the ordered result list
    ///
    /// # Errors
    ///
    /// [`ReduceError::MissingSlot`] if any slot was never written.
    pub fn finish(self) -> Result<Vec<EntityResult>, ReduceError> {
        let mut out = Vec::new();
        out.try_reserve_exact(self.slots.len())
            .map_err(|cause| ReduceError::ResourceExhausted {
                slots: self.slots.len(),
                cause,
            })?;
        for (slot, cell) in self.slots.into_iter().enumerate() {
            out.push(cell.into_inner().ok_or(ReduceError::MissingSlot { slot })?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256PlusPlus;
    use std::time::Duration;

    fn result(name: &str) -> EntityResult {
        EntityResult::new(name, StatAccumulator::new())
    }

    fn names(results: &[EntityResult]) -> Vec<&str> {
        results.iter().map(|r| r.entity.as_str()).collect()
    }

    #[test]
    fn test_offsets_with_empty_sources() {
        let collector = ResultCollector::new(vec![0, 5, 3, 0]).unwrap();
        assert_eq!(collector.offsets(), &[0, 0, 5, 8]);
        assert_eq!(collector.total_slots(), 8);

        // zero-count sources own no slots
        assert!(matches!(collector.slot_of(0, 0), Err(ReduceError::SlotOutOfRange { .. })));
        assert!(matches!(collector.slot_of(3, 0), Err(ReduceError::SlotOutOfRange { .. })));
        assert_eq!(collector.slot_of(1, 0).unwrap(), 0);
        assert_eq!(collector.slot_of(2, 2).unwrap(), 7);
    }

    #[test]
    fn test_place_all_orders_by_offset() {
        let collector = ResultCollector::new(vec![0, 2, 1, 0]).unwrap();
        collector.place_all(2, vec![result("c")]).unwrap();
        collector.place_all(3, vec![]).unwrap();
        collector.place_all(1, vec![result("a"), result("b")]).unwrap();
        collector.place_all(0, vec![]).unwrap();

        let results = collector.finish().unwrap();
        assert_eq!(names(&results), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_write_once() {
        let collector = ResultCollector::new(vec![1]).unwrap();
        collector.place(0, 0, result("a")).unwrap();
        assert!(matches!(
            collector.place(0, 0, result("b")),
            Err(ReduceError::SlotAlreadyFilled { slot: 0 })
        ));
        assert_eq!(collector.finish().unwrap()[0].entity, "a");
    }

    #[test]
    fn test_missing_slot_is_fatal() {
        let collector = ResultCollector::new(vec![2]).unwrap();
        collector.place(0, 1, result("b")).unwrap();
        assert_eq!(collector.filled(), 1);
        assert!(matches!(collector.finish(), Err(ReduceError::MissingSlot { slot: 0 })));
    }

    #[test]
    fn test_count_mismatch_and_unknown_source() {
        let collector = ResultCollector::new(vec![2, 1]).unwrap();
        assert!(matches!(
            collector.place_all(0, vec![result("a")]),
            Err(ReduceError::CountMismatch { source_id: 0, expected: 2, actual: 1 })
        ));
        assert!(matches!(
            collector.place_all(5, vec![]),
            Err(ReduceError::UnknownSource { source_id: 5, sources: 2 })
        ));
    }

    #[test]
    fn test_per_item() {
        let collector = ResultCollector::per_item(3).unwrap();
        assert_eq!(collector.num_sources(), 3);
        assert_eq!(collector.offsets(), &[0, 1, 2]);
        collector.place(2, 0, result("z")).unwrap();
        collector.place(0, 0, result("x")).unwrap();
        collector.place(1, 0, result("y")).unwrap();
        assert_eq!(names(&collector.finish().unwrap()), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_empty_collector() {
        let collector = ResultCollector::new(vec![]).unwrap();
        assert!(collector.finish().unwrap().is_empty());
    }

    #[test]
    fn test_order_independent_of_completion() {
        let counts = vec![3, 0, 4, 1, 0, 2];
        let expected: Vec<String> = counts
            .iter()
            .enumerate()
            .flat_map(|(s, &c)| (0..c).map(move |i| format!("s{s}-{i}")))
            .collect();

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        for _ in 0..10 {
            let mut order: Vec<usize> = (0..counts.len()).collect();
            order.shuffle(&mut rng);
            let delays: Vec<u64> = (0..counts.len()).map(|_| rng.gen_range(0..3)).collect();

            let collector = ResultCollector::new(counts.clone()).unwrap();
            std::thread::scope(|s| {
                for &source in &order {
                    let collector = &collector;
                    let count = counts[source];
                    let delay = delays[source];
                    s.spawn(move || {
                        std::thread::sleep(Duration::from_millis(delay));
                        let results = (0..count).map(|i| result(&format!("s{source}-{i}"))).collect();
                        collector.place_all(source, results).unwrap();
                    });
                }
            });

            let got: Vec<String> = collector.finish().unwrap().into_iter().map(|r| r.entity).collect();
            assert_eq!(got, expected);
        }
    }
}
