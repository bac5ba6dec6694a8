//! wxreduce - parallel per-entity weather statistics
//!
//! Reduces one record stream per entity (a city, a station) into a
//! [`stats::StatAccumulator`] and gathers the results into one ordered
//! collection, whatever backend produced them.
//!
//! # Architecture
//!
//! - **Partition-level**: a shared-memory worker pool ([`worker`]) or
//!   distributed node services ([`distributed`]) each reduce whole work items
//! - **Record-level**: a block-parallel kernel ([`kernel`]) splits one
//!   entity's records across execution groups and tree-reduces them
//! - **Ordered gather**: [`collector::ResultCollector`] places every result
//!   at a deterministic slot, independent of completion order

pub mod collector;
pub mod config;
pub mod distributed;
pub mod error;
pub mod kernel;
pub mod output;
pub mod partition;
pub mod reduce;
pub mod source;
pub mod stats;
pub mod util;
pub mod worker;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use collector::{EntityResult, ResultCollector};
pub use config::Config;
pub use error::{ReduceError, SourceError};
pub use stats::StatAccumulator;

/// Result type used throughout wxreduce
pub type Result<T> = anyhow::Result<T>;
