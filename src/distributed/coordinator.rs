//! Distributed coordinator
//!
//! The coordinator:
//! - plans the rank assignment with a deterministic policy
//! - sends every node the full work-item list and its rank
//! - gathers each node's results, blocking or non-blocking
//! - verifies every node delivered the count the plan expects
//! - places results into a [`ResultCollector`] at
//!   `offset(rank) + local_index`
//!
//! # Gather modes
//!
//! - **blocking**: nodes are driven one at a time in rank order
//! - **nonblocking**: all exchanges run concurrently as tokio tasks; the
//!   coordinator waits for every task before the collector is read
//!
//! Both modes produce the same ordering, since placement depends only on
//! the per-rank counts.

use crate::collector::{EntityResult, ResultCollector};
use crate::config::{DistributedConfig, WorkerConfig};
use crate::distributed::node_service::NodeService;
use crate::distributed::protocol::*;
use crate::error::ReduceError;
use crate::partition::{PartitionPlanner, PartitionPolicy};
use crate::source::WorkItem;
use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// How the coordinator collects node results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GatherMode {
    #[default]
    Blocking,
    Nonblocking,
}

impl GatherMode {
    pub fn as_str(self) -> &'static str {
        match self {
            GatherMode::Blocking => "blocking",
            GatherMode::Nonblocking => "nonblocking",
        }
    }
}

/// Per-node summary of one gather
#[derive(Debug, Clone)]
pub struct NodeSummary {
    pub rank: usize,
    pub node_id: String,
    pub local_count: usize,
    pub duration: Duration,
}

/// Result of one distributed run
#[derive(Debug)]
pub struct GatherOutcome {
    /// Results ordered by `offset(rank) + local_index`
    pub results: Vec<EntityResult>,
    pub nodes: Vec<NodeSummary>,
}

/// Distributed coordinator
pub struct DistributedCoordinator {
    /// Node addresses (host:port), one per rank
    node_addresses: Vec<String>,
    policy: PartitionPolicy,
    gather: GatherMode,
    local: WorkerConfig,
}

impl DistributedCoordinator {
    /// Create a coordinator
    ///
    /// # Errors
    ///
    /// Fails without nodes, or when the rank policy is pull-based: node
    /// ownership must be computable independently on every node.
    pub fn new(node_addresses: Vec<String>, distributed: &DistributedConfig, local: &WorkerConfig) -> Result<Self> {
        if node_addresses.is_empty() {
            anyhow::bail!("No nodes specified for distributed mode");
        }
        if !distributed.policy.is_deterministic() {
            anyhow::bail!(
                "Distributed policy must be block or cyclic, got '{}'",
                distributed.policy
            );
        }

        Ok(Self {
            node_addresses,
            policy: distributed.policy,
            gather: distributed.gather,
            local: local.clone(),
        })
    }

    pub fn world_size(&self) -> usize {
        self.node_addresses.len()
    }

    /// Run one distributed reduction over `items`
    pub async fn run(&self, items: Vec<WorkItem>) -> Result<GatherOutcome> {
        let world_size = self.world_size();
        let planner = PartitionPlanner::new(self.policy, world_size, 1);
        let assignment = planner
            .assignment(items.len())
            .with_context(|| format!("Policy '{}' cannot assign work across nodes", self.policy))?;
        let counts = assignment.counts();
        let collector = ResultCollector::new(counts.clone())?;

        info!(
            items = items.len(),
            nodes = world_size,
            policy = %self.policy,
            gather = self.gather.as_str(),
            "starting distributed gather"
        );

        let start = Instant::now();
        let items = Arc::new(items);
        let mut nodes = Vec::with_capacity(world_size);

        match self.gather {
            GatherMode::Blocking => {
                for (rank, addr) in self.node_addresses.iter().enumerate() {
                    let msg = self.assign_message(rank, &items);
                    let reply = exchange(addr.clone(), msg).await?;
                    nodes.push(place_reply(&collector, &counts, rank, reply)?);
                }
            }
            GatherMode::Nonblocking => {
                let handles: Vec<JoinHandle<Result<ResultsMessage>>> = self
                    .node_addresses
                    .iter()
                    .enumerate()
                    .map(|(rank, addr)| tokio::spawn(exchange(addr.clone(), self.assign_message(rank, &items))))
                    .collect();

                // Wait for every exchange before the collector is read
                for (rank, handle) in handles.into_iter().enumerate() {
                    let reply = handle.await.context("Gather task failed")??;
                    nodes.push(place_reply(&collector, &counts, rank, reply)?);
                }
            }
        }

        let results = collector.finish()?;
        info!(
            results = results.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "gather complete"
        );

        Ok(GatherOutcome { results, nodes })
    }

    fn assign_message(&self, rank: usize, items: &Arc<Vec<WorkItem>>) -> AssignMessage {
        AssignMessage {
            protocol_version: PROTOCOL_VERSION,
            rank,
            world_size: self.world_size(),
            policy: self.policy,
            threads: self.local.threads,
            local_policy: self.local.policy,
            chunk_size: self.local.chunk_size,
            items: items.as_ref().clone(),
        }
    }
}

/// One ASSIGN → RESULTS exchange with a node
async fn exchange(addr: String, msg: AssignMessage) -> Result<ResultsMessage> {
    let rank = msg.rank;
    let mut stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("Failed to connect to node {addr}"))?;
    debug!(rank, %addr, "connected to node");

    write_message(&mut stream, &Message::Assign(msg)).await?;

    match read_message(&mut stream).await? {
        Message::Results(results) => {
            if results.protocol_version != PROTOCOL_VERSION {
                anyhow::bail!(
                    "Protocol version mismatch from {addr}: node={}, coordinator={}",
                    results.protocol_version,
                    PROTOCOL_VERSION
                );
            }
            if results.rank != rank {
                anyhow::bail!("Node {addr} answered for rank {} instead of {rank}", results.rank);
            }
            Ok(results)
        }
        Message::Error(err) => anyhow::bail!("Node {} (rank {}) failed: {}", err.node_id, err.rank, err.error),
        other => anyhow::bail!("Expected RESULTS from {addr}, got {:?}", other),
    }
}

/// Verify a node's counts against the plan and place its results
fn place_reply(collector: &ResultCollector, counts: &[usize], rank: usize, reply: ResultsMessage) -> Result<NodeSummary> {
    let expected = counts.get(rank).copied().unwrap_or(0);
    if reply.local_count != expected {
        return Err(ReduceError::CountMismatch {
            source_id: rank,
            expected,
            actual: reply.local_count,
        }
        .into());
    }

    let summary = NodeSummary {
        rank,
        node_id: reply.node_id,
        local_count: reply.local_count,
        duration: Duration::from_nanos(reply.duration_ns),
    };
    collector.place_all(rank, reply.results)?;
    debug!(rank, node_id = %summary.node_id, results = summary.local_count, "node results placed");
    Ok(summary)
}

/// Spawn `count` node services on loopback
///
/// # Returns
///
/// The node addresses, in rank order, and the service tasks. Abort the tasks
/// once the run is over.
pub async fn spawn_local_nodes(count: usize) -> Result<(Vec<String>, Vec<JoinHandle<Result<()>>>)> {
    let mut addrs = Vec::with_capacity(count);
    let mut handles = Vec::with_capacity(count);
    for _ in 0..count {
        let service = NodeService::bind("127.0.0.1:0").await?;
        addrs.push(service.local_addr()?.to_string());
        handles.push(tokio::spawn(service.run()));
    }
    Ok((addrs, handles))
}
