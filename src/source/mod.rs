//! Work items and record sources
//!
//! A [`WorkItem`] names one record sequence (one entity) and is immutable once
//! enumerated. A [`RecordSource`] turns a work item into a lazy, finite
//! stream of [`Record`]s. Asking a source for the same item twice restarts
//! the stream from the beginning.
//!
//! Sources are shared read-only across every worker, hence the
//! `Send + Sync` bound.
//!
//! # Implementations
//!
//! - [`csv::CsvRecordSource`]: reads one CSV file per work item
//! - [`memory::MemorySource`]: serves records from memory (tests, kernels)

pub mod csv;
pub mod discovery;
pub mod memory;

use crate::error::SourceError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One typed record
///
/// Every field may be absent independently. `bucket` is the raw derived key;
/// values outside `0..BUCKETS` are carried through and dropped by the reducer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Record {
    /// Primary metric (temperature)
    pub primary: Option<f64>,
    /// Secondary metric (precipitation)
    pub secondary: Option<f64>,
    /// Bucket key (month index)
    pub bucket: Option<i32>,
}

impl Record {
    pub fn new(primary: Option<f64>, secondary: Option<f64>, bucket: Option<i32>) -> Self {
        Self {
            primary,
            secondary,
            bucket,
        }
    }
}

/// One enumerated record sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Dense index in `0..N`, position in the discovery order
    pub index: usize,
    /// Handle used by the record source
    pub path: PathBuf,
    /// Sanitised entity name
    pub entity: String,
}

impl WorkItem {
    pub fn new(index: usize, path: impl Into<PathBuf>, entity: impl Into<String>) -> Self {
        Self {
            index,
            path: path.into(),
            entity: entity.into(),
        }
    }
}

/// Boxed record stream returned by a source
pub type RecordIter<'a> = Box<dyn Iterator<Item = Record> + Send + 'a>;

/// Produces the record stream for a work item
pub trait RecordSource: Send + Sync {
    /// Open the record stream of `item`
    ///
    /// An error means the whole item is unreadable. Malformed fields inside
    /// the stream are never errors; they show up as absent values.
    fn records<'a>(&'a self, item: &WorkItem) -> Result<RecordIter<'a>, SourceError>;
}
