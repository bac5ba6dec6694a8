//! In-memory record source

use super::{Record, RecordIter, RecordSource, WorkItem};
use crate::error::SourceError;
use std::collections::HashMap;
use std::path::PathBuf;

/// Serves pre-built record streams keyed by work-item path
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    streams: HashMap<PathBuf, Vec<Record>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the records for `path`, replacing any previous stream
    pub fn insert(&mut self, path: impl Into<PathBuf>, records: Vec<Record>) {
        self.streams.insert(path.into(), records);
    }

    /// Build a source plus matching work items, one per `(entity, records)`
    ///
    /// Each entity gets the synthetic path `mem://<index>`.
    pub fn with_entities<I, S>(entities: I) -> (Self, Vec<WorkItem>)
    where
        I: IntoIterator<Item = (S, Vec<Record>)>,
        S: Into<String>,
    {
        let mut source = Self::new();
        let mut items = Vec::new();
        for (index, (entity, records)) in entities.into_iter().enumerate() {
            let path = PathBuf::from(format!("mem://{index}"));
            source.insert(path.clone(), records);
            items.push(WorkItem::new(index, path, entity));
        }
        (source, items)
    }

    /// Records registered for `path`
    pub fn get(&self, path: &std::path::Path) -> Option<&[Record]> {
        self.streams.get(path).map(Vec::as_slice)
    }
}

impl RecordSource for MemorySource {
    fn records<'a>(&'a self, item: &WorkItem) -> Result<RecordIter<'a>, SourceError> {
        let records = self.streams.get(&item.path).ok_or_else(|| SourceError::Unknown {
            path: item.path.clone(),
        })?;
        Ok(Box::new(records.iter().copied()))
    }
}
