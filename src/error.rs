//! Error taxonomy for the reduction core
//!
//! Only two families of failure exist inside the core:
//!
//! - **Source errors**: a work item could not be read. These are never fatal;
//!   the reducer logs them and substitutes the identity accumulator.
//! - **Reduction errors**: the result buffers could not be allocated, or the
//!   ordering contract of the collector was violated. These abort the run,
//!   since a partially populated result table would silently corrupt the
//!   offset arithmetic used for ordering.
//!
//! Missing or malformed fields inside a record are not errors at all; the
//! record parser degrades them to "absent".

use std::collections::TryReserveError;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors raised by the reduction core
#[derive(Debug, Error)]
pub enum ReduceError {
    /// The result buffer for the collector could not be allocated
    #[error("failed to allocate {slots} result slots")]
    ResourceExhausted {
        slots: usize,
        #[source]
        cause: TryReserveError,
    },

    /// A result was attributed to a source the collector does not know about
    #[error("source {source_id} is out of range (collector has {sources} sources)")]
    UnknownSource { source_id: usize, sources: usize },

    /// A source tried to write past the slots it announced
    #[error("source {source_id} wrote local index {local_index}, but only announced {count} results")]
    SlotOutOfRange {
        source_id: usize,
        local_index: usize,
        count: usize,
    },

    /// A slot was written twice
    #[error("result slot {slot} was written more than once")]
    SlotAlreadyFilled { slot: usize },

    /// A slot was never written before the collection was finalized
    #[error("result slot {slot} was never written")]
    MissingSlot { slot: usize },

    /// A source delivered a different number of results than expected
    #[error("source {source_id} delivered {actual} results, expected {expected}")]
    CountMismatch {
        source_id: usize,
        expected: usize,
        actual: usize,
    },

    /// The record-level kernel was given an impossible launch geometry
    #[error("invalid kernel launch: {0}")]
    InvalidLaunch(String),
}

/// Non-fatal error raised when a work item cannot be read
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        cause: std::io::Error,
    },

    #[error("no records registered for {}", path.display())]
    Unknown { path: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduce_error_messages() {
        let err = ReduceError::CountMismatch {
            source_id: 2,
            expected: 5,
            actual: 3,
        };
        assert_eq!(err.to_string(), "source 2 delivered 3 results, expected 5");

        let err = ReduceError::SlotAlreadyFilled { slot: 7 };
        assert_eq!(err.to_string(), "result slot 7 was written more than once");
    }

    #[test]
    fn test_source_error_keeps_cause() {
        use std::error::Error as _;

        let err = SourceError::Open {
            path: PathBuf::from("/nowhere/a.csv"),
            cause: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.to_string().contains("/nowhere/a.csv"));
        assert!(err.source().is_some());
    }
}
