//! Distributed mode implementation
//!
//! # Architecture
//!
//! wxreduce distributed mode uses a coordinator-node architecture:
//!
//! - **Coordinator**: plans rank ownership, sends assignments, gathers and
//!   orders results
//! - **Node Service**: owns one rank, reduces its share of the work items
//!   (optionally on a local worker pool) and reports back
//!
//! Nodes never exchange data with each other; the gather is the only
//! communication after assignment.
//!
//! # Modules
//!
//! - `protocol`: Message definitions and framing
//! - `node_service`: Node service implementation
//! - `coordinator`: Coordinator and gather modes

pub mod coordinator;
pub mod node_service;
pub mod protocol;

pub use coordinator::{spawn_local_nodes, DistributedCoordinator, GatherMode, GatherOutcome};
pub use node_service::NodeService;
pub use protocol::{AssignMessage, ErrorMessage, Message, ResultsMessage, PROTOCOL_VERSION};
