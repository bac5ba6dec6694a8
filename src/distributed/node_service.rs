//! Node service for distributed mode
//!
//! A node service owns one rank of a distributed run. For every coordinator
//! connection it:
//! - receives the full work-item list plus its rank
//! - derives its own share from `(rank, world_size, policy)`, which must be a
//!   deterministic policy so every node and the coordinator agree on counts
//! - reduces its share locally, on the worker pool when `threads > 1`
//! - sends the results back in local order, or an error message
//!
//! No node talks to any other node while reducing.

use crate::collector::EntityResult;
use crate::distributed::protocol::*;
use crate::partition::PartitionPlanner;
use crate::reduce::reduce_item;
use crate::source::csv::CsvRecordSource;
use crate::source::{RecordSource, WorkItem};
use crate::worker::WorkerPool;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info};

/// Node service
///
/// Runs on each node in distributed mode, accepting assignments from the
/// coordinator.
pub struct NodeService {
    listener: TcpListener,

    /// Node identifier (hostname)
    node_id: String,

    source: Arc<dyn RecordSource>,
}

impl NodeService {
    /// Bind a node service reading CSV work items
    pub async fn bind(addr: &str) -> Result<Self> {
        Self::bind_with_source(addr, Arc::new(CsvRecordSource::new())).await
    }

    /// Bind a node service with an explicit record source
    pub async fn bind_with_source(addr: &str, source: Arc<dyn RecordSource>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind node service on {addr}"))?;

        Ok(Self {
            listener,
            node_id: get_node_id(),
            source,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().context("Failed to read node service address")
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Serve coordinator connections until the task is dropped
    pub async fn run(self) -> Result<()> {
        info!(addr = %self.local_addr()?, node_id = %self.node_id, "node service listening");

        loop {
            if let Err(e) = self.serve_one().await {
                error!(error = %format!("{e:#}"), "exchange failed");
            }
        }
    }

    /// Accept and handle exactly one coordinator connection
    pub async fn serve_one(&self) -> Result<()> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .context("Failed to accept connection")?;
        debug!(%peer, "coordinator connected");
        self.handle_exchange(stream).await
    }

    async fn handle_exchange(&self, mut stream: TcpStream) -> Result<()> {
        let assign = match read_message(&mut stream).await? {
            Message::Assign(msg) => msg,
            other => anyhow::bail!("Expected ASSIGN message, got {:?}", other),
        };

        if assign.protocol_version != PROTOCOL_VERSION {
            let err = format!(
                "Protocol version mismatch: coordinator={}, node={}",
                assign.protocol_version, PROTOCOL_VERSION
            );
            self.send_error(&mut stream, assign.rank, &err).await?;
            anyhow::bail!(err);
        }

        let rank = assign.rank;
        let source = Arc::clone(&self.source);
        let start = Instant::now();
        let outcome = tokio::task::spawn_blocking(move || reduce_local_share(&assign, source))
            .await
            .context("Local reduction task failed")?;

        match outcome {
            Ok(results) => {
                info!(
                    rank,
                    results = results.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "local share reduced"
                );
                let msg = ResultsMessage {
                    protocol_version: PROTOCOL_VERSION,
                    rank,
                    node_id: self.node_id.clone(),
                    local_count: results.len(),
                    results,
                    duration_ns: start.elapsed().as_nanos() as u64,
                };
                write_message(&mut stream, &Message::Results(msg)).await
            }
            Err(e) => {
                let err = format!("{e:#}");
                self.send_error(&mut stream, rank, &err).await?;
                Err(e)
            }
        }
    }

    async fn send_error(&self, stream: &mut TcpStream, rank: usize, error: &str) -> Result<()> {
        let msg = ErrorMessage {
            rank,
            node_id: self.node_id.clone(),
            error: error.to_string(),
        };
        write_message(stream, &Message::Error(msg)).await
    }
}

/// Items owned by `rank`, in local order
///
/// # Errors
///
/// Fails when the policy is pull-based or the rank is out of range.
pub fn local_share(assign: &AssignMessage) -> Result<Vec<WorkItem>> {
    if assign.rank >= assign.world_size {
        anyhow::bail!("Rank {} out of range for world size {}", assign.rank, assign.world_size);
    }
    let planner = PartitionPlanner::new(assign.policy, assign.world_size, 1);
    let assignment = planner
        .assignment(assign.items.len())
        .with_context(|| format!("Policy '{}' cannot assign work across nodes", assign.policy))?;

    assignment
        .worker(assign.rank)
        .iter()
        .enumerate()
        .map(|(local, &global)| {
            let item = assign
                .items
                .get(global)
                .with_context(|| format!("Work item {global} missing from assignment"))?;
            Ok(WorkItem {
                index: local,
                ..item.clone()
            })
        })
        .collect()
}

/// Reduce this node's share of an assignment
pub fn reduce_local_share(assign: &AssignMessage, source: Arc<dyn RecordSource>) -> Result<Vec<EntityResult>> {
    let share = local_share(assign)?;
    debug!(rank = assign.rank, items = share.len(), threads = assign.threads, "reducing local share");

    if assign.threads > 1 {
        let pool = WorkerPool::new(PartitionPlanner::new(assign.local_policy, assign.threads, assign.chunk_size));
        return Ok(pool.run(Arc::new(share), source)?.results);
    }

    Ok(share
        .iter()
        .map(|item| EntityResult::new(item.entity.clone(), reduce_item(source.as_ref(), item)))
        .collect())
}

/// Node identifier: hostname, or "unknown"
pub fn get_node_id() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}
