//! CSV record parsing
//!
//! One CSV file per entity. The first line is a header and is skipped. Each
//! following line becomes one [`Record`]:
//!
//! | Field | Meaning |
//! |---|---|
//! | 2 | date, `YYYY-MM-DD`; the month gives the bucket key |
//! | 4 | average temperature (primary metric) |
//! | 7 | precipitation (secondary metric) |
//!
//! Fields are extracted with bounds-checked slicing of the line buffer owned
//! by the reader. A missing, empty, unparseable or non-finite value is absent.

use super::{Record, RecordIter, RecordSource, WorkItem};
use crate::error::SourceError;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::warn;

const DATE_FIELD: usize = 2;
const PRIMARY_FIELD: usize = 4;
const SECONDARY_FIELD: usize = 7;

/// Record source backed by one CSV file per work item
#[derive(Debug, Clone, Default)]
pub struct CsvRecordSource;

impl CsvRecordSource {
    pub fn new() -> Self {
        Self
    }
}

impl RecordSource for CsvRecordSource {
    fn records<'a>(&'a self, item: &WorkItem) -> Result<RecordIter<'a>, SourceError> {
        let file = File::open(&item.path).map_err(|cause| SourceError::Open {
            path: item.path.clone(),
            cause,
        })?;
        Ok(Box::new(CsvRecords::new(BufReader::new(file), &item.path)))
    }
}

/// Lazy record iterator over a CSV reader
pub struct CsvRecords<R> {
    reader: R,
    line: String,
    path: PathBuf,
    header_skipped: bool,
    done: bool,
}

impl<R: BufRead> CsvRecords<R> {
    pub fn new(reader: R, path: &Path) -> Self {
        Self {
            reader,
            line: String::new(),
            path: path.to_path_buf(),
            header_skipped: false,
            done: false,
        }
    }

    /// Read the next raw line into the owned buffer, `false` at end of stream
    fn next_line(&mut self) -> bool {
        self.line.clear();
        match self.reader.read_line(&mut self.line) {
            Ok(0) => false,
            Ok(_) => true,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "read error, truncating record stream");
                false
            }
        }
    }
}

impl<R: BufRead> Iterator for CsvRecords<R> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        if self.done {
            return None;
        }
        if !self.header_skipped {
            self.header_skipped = true;
            if !self.next_line() {
                self.done = true;
                return None;
            }
        }
        if !self.next_line() {
            self.done = true;
            return None;
        }
        Some(parse_line(&self.line))
    }
}

/// Parse one data line
pub fn parse_line(line: &str) -> Record {
    let line = line.trim_end_matches(['\n', '\r']);
    Record {
        primary: field(line, PRIMARY_FIELD).and_then(parse_value),
        secondary: field(line, SECONDARY_FIELD).and_then(parse_value),
        bucket: field(line, DATE_FIELD).and_then(month_bucket),
    }
}

/// Field `n` (0-based), or `None` if the line has fewer fields
fn field(line: &str, n: usize) -> Option<&str> {
    line.split(',').nth(n)
}

fn parse_value(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Bucket key from a `YYYY-MM-DD` date: the month minus one
///
/// A numeric month outside 1..=12 still yields a key; the reducer drops it.
pub fn month_bucket(date: &str) -> Option<i32> {
    let month = date.trim().get(5..7)?;
    if !month.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    month.parse::<i32>().ok().map(|m| m - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    const HEADER: &str = "station_id,city_name,date,season,avg_temp_c,min_temp_c,max_temp_c,precipitation_mm\n";

    #[test]
    fn test_parse_full_line() {
        let r = parse_line("S1,Oslo,2021-03-14,spring,4.5,1.0,8.0,2.25\n");
        assert_eq!(r.primary, Some(4.5));
        assert_eq!(r.secondary, Some(2.25));
        assert_eq!(r.bucket, Some(2));
    }

    #[test]
    fn test_parse_missing_fields() {
        let r = parse_line("S1,Oslo,2021-03-14,spring,,1.0,8.0,\r\n");
        assert_eq!(r.primary, None);
        assert_eq!(r.secondary, None);
        assert_eq!(r.bucket, Some(2));

        let r = parse_line("S1,Oslo,2021-12-01,winter,-3.5");
        assert_eq!(r.primary, Some(-3.5));
        assert_eq!(r.secondary, None);
        assert_eq!(r.bucket, Some(11));
    }

    #[test]
    fn test_parse_garbage_values() {
        let r = parse_line("S1,Oslo,2021-03-14,spring,warm,1.0,8.0,NaN");
        assert_eq!(r.primary, None);
        assert_eq!(r.secondary, None);

        let r = parse_line("S1,Oslo,2021-03-14,spring,inf,1.0,8.0,1.0");
        assert_eq!(r.primary, None);
        assert_eq!(r.secondary, Some(1.0));
    }

    #[test]
    fn test_month_bucket() {
        assert_eq!(month_bucket("2021-01-31"), Some(0));
        assert_eq!(month_bucket("2021-12"), Some(11));
        assert_eq!(month_bucket("2021-13-01"), Some(12));
        assert_eq!(month_bucket("2021-00-01"), Some(-1));
        assert_eq!(month_bucket("2021-x1-01"), None);
        assert_eq!(month_bucket("2021"), None);
        assert_eq!(month_bucket(""), None);
        assert_eq!(month_bucket("2021-é1"), None);
    }

    #[test]
    fn test_header_skipped() {
        let data = format!("{HEADER}S1,Oslo,2021-01-01,winter,1.0,0,0,0.5\nS1,Oslo,2021-01-02,winter,2.0,0,0,\n");
        let records: Vec<_> = CsvRecords::new(Cursor::new(data), Path::new("mem")).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].primary, Some(1.0));
        assert_eq!(records[1].secondary, None);
    }

    #[test]
    fn test_header_only_and_empty() {
        let records: Vec<_> = CsvRecords::new(Cursor::new(HEADER), Path::new("mem")).collect();
        assert!(records.is_empty());

        let records: Vec<_> = CsvRecords::new(Cursor::new(""), Path::new("mem")).collect();
        assert!(records.is_empty());
    }

    #[test]
    fn test_source_reads_file_and_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Oslo.csv");
        let mut f = File::create(&path).unwrap();
        write!(f, "{HEADER}S1,Oslo,2021-05-01,spring,10.0,0,0,1.0\n").unwrap();
        drop(f);

        let source = CsvRecordSource::new();
        let item = WorkItem::new(0, &path, "Oslo");
        let first: Vec<_> = source.records(&item).unwrap().collect();
        let second: Vec<_> = source.records(&item).unwrap().collect();
        assert_eq!(first.len(), 1);
        assert_eq!(first, second);
        assert_eq!(first[0].bucket, Some(4));
    }

    #[test]
    fn test_source_missing_file() {
        let source = CsvRecordSource::new();
        let item = WorkItem::new(0, "/definitely/not/here.csv", "Nowhere");
        assert!(matches!(source.records(&item), Err(SourceError::Open { .. })));
    }
}
