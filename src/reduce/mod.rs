//! Local reduction
//!
//! The [`LocalReducer`] folds a record stream into one [`StatAccumulator`].
//! It is the only place records turn into statistics, and it runs the same
//! way for a whole file (partition-level regime) as for one execution unit's
//! share of a stream (record-level regime).
//!
//! # Record policy
//!
//! - every record increments `total_records`
//! - a missing primary value contributes nothing else on the primary side
//! - a bucket key outside `0..BUCKETS` is dropped from bucket accumulation,
//!   the primary value still counts towards `count/sum/min/max`
//! - a secondary value counts independently of the primary value

use crate::source::{Record, RecordSource, WorkItem};
use crate::stats::{StatAccumulator, BUCKETS};
use tracing::warn;

/// Folds records into a single accumulator owned by one worker
#[derive(Debug, Clone, Default)]
pub struct LocalReducer {
    acc: StatAccumulator,
}

impl LocalReducer {
    pub fn new() -> Self {
        Self {
            acc: StatAccumulator::new(),
        }
    }

    /// Fold one record
    #[inline]
    pub fn push(&mut self, record: &Record) {
        self.acc.total_records += 1;

        if let Some(value) = record.primary {
            let bucket = record
                .bucket
                .and_then(|b| usize::try_from(b).ok())
                .filter(|&b| b < BUCKETS);
            self.acc.add_primary(value, bucket);
        }

        if let Some(value) = record.secondary {
            self.acc.add_secondary(value);
        }
    }

    /// Accumulator folded so far
    pub fn current(&self) -> &StatAccumulator {
        &self.acc
    }

    pub fn finish(self) -> StatAccumulator {
        self.acc
    }

    /// Fold a whole record sequence
    pub fn fold<'r, I>(records: I) -> StatAccumulator
    where
        I: IntoIterator<Item = &'r Record>,
    {
        let mut reducer = Self::new();
        for record in records {
            reducer.push(record);
        }
        reducer.finish()
    }
}

/// Reduce one work item end to end
///
/// An unreadable item is logged and degrades to the identity accumulator
/// (`total_records = 0`); it never fails the run.
pub fn reduce_item<S>(source: &S, item: &WorkItem) -> StatAccumulator
where
    S: RecordSource + ?Sized,
{
    match source.records(item) {
        Ok(records) => {
            let mut reducer = LocalReducer::new();
            for record in records {
                reducer.push(&record);
            }
            reducer.finish()
        }
        Err(e) => {
            warn!(entity = %item.entity, error = %e, "skipping unreadable work item");
            StatAccumulator::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::memory::MemorySource;
    use crate::testing::{isclose, synthetic_records};

    fn primary(v: f64) -> Record {
        Record::new(Some(v), None, Some(0))
    }

    #[test]
    fn test_fold_empty() {
        let empty: Vec<Record> = Vec::new();
        let acc = LocalReducer::fold(&empty);
        assert_eq!(acc, StatAccumulator::IDENTITY);
    }

    #[test]
    fn test_missing_primary_counts_record() {
        let records = [
            primary(1.0),
            Record::new(None, Some(3.0), Some(0)),
            primary(2.0),
        ];
        let acc = LocalReducer::fold(&records);
        assert_eq!(acc.total_records, 3);
        assert_eq!(acc.count, 2);
        assert_eq!(acc.secondary_count, 1);
        assert_eq!(acc.buckets[0].count, 2);
    }

    #[test]
    fn test_invalid_bucket_keeps_primary() {
        let records = [
            Record::new(Some(5.0), None, Some(-1)),
            Record::new(Some(7.0), None, Some(12)),
            Record::new(Some(9.0), None, None),
            Record::new(Some(11.0), None, Some(6)),
        ];
        let acc = LocalReducer::fold(&records);
        assert_eq!(acc.count, 4);
        assert_eq!(acc.sum, 32.0);
        assert_eq!(acc.min, 5.0);
        assert_eq!(acc.max, 11.0);
        let bucket_total: u64 = acc.buckets.iter().map(|b| b.count).sum();
        assert_eq!(bucket_total, 1);
        assert_eq!(acc.buckets[6].sum, 11.0);
    }

    #[test]
    fn test_record_with_nothing() {
        let acc = LocalReducer::fold(&[Record::default()]);
        assert_eq!(acc.total_records, 1);
        assert_eq!(acc.count, 0);
        assert_eq!(acc.min, f64::INFINITY);
        assert_eq!(acc.max, f64::NEG_INFINITY);
    }

    #[test]
    fn test_split_fold_then_combine() {
        let records = [primary(10.0), primary(20.0), primary(30.0)];
        let a = LocalReducer::fold(&records[..1]);
        let b = LocalReducer::fold(&records[1..]);
        let c = a.combine(&b);
        assert_eq!(c.count, 3);
        assert_eq!(c.sum, 60.0);
        assert_eq!(c.min, 10.0);
        assert_eq!(c.max, 30.0);
    }

    #[test]
    fn test_split_anywhere_matches_whole() {
        let records = synthetic_records(500, 99);
        let whole = LocalReducer::fold(&records);
        for split in [0, 1, 137, 250, 499, 500] {
            let parts = LocalReducer::fold(&records[..split]).combine(&LocalReducer::fold(&records[split..]));
            assert_eq!(parts.count, whole.count);
            assert_eq!(parts.min, whole.min);
            assert_eq!(parts.max, whole.max);
            assert_eq!(parts.total_records, whole.total_records);
            assert!(isclose(parts.sum, whole.sum, 1e-6, 1e-9));
        }
    }

    #[test]
    fn test_bucket_counts_bounded_by_count() {
        let acc = LocalReducer::fold(&synthetic_records(1000, 5));
        let bucket_total: u64 = acc.buckets.iter().map(|b| b.count).sum();
        assert!(bucket_total <= acc.count);
        assert!(acc.count <= acc.total_records);
        assert!(acc.min <= acc.max);
    }

    #[test]
    fn test_reduce_item_unreadable() {
        let source = MemorySource::new();
        let item = WorkItem::new(0, "mem://gone", "gone");
        let acc = reduce_item(&source, &item);
        assert_eq!(acc, StatAccumulator::IDENTITY);
        assert_eq!(acc.total_records, 0);
    }

    #[test]
    fn test_reduce_item_reads_stream() {
        let (source, items) = MemorySource::with_entities(vec![("x", vec![primary(4.0), primary(6.0)])]);
        let acc = reduce_item(&source, &items[0]);
        assert_eq!(acc.count, 2);
        assert_eq!(acc.mean(), Some(5.0));
    }
}
