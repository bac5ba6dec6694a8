//! Distributed gather protocol
//!
//! Messages exchanged between the coordinator and node services. The protocol
//! uses MessagePack (rmp-serde) so every serde attribute on the payload types
//! is honoured, and `f64` sentinels (`±inf` in empty accumulators) survive
//! the trip unchanged.
//!
//! # Protocol Version
//!
//! Current version: 1
//!
//! # Message Flow
//!
//! ```text
//! Coordinator                     Node (rank r)
//!     |                              |
//!     |-- ASSIGN(rank, items) ------>|
//!     |                              |  local partition-level reduction
//!     |<----- RESULTS(count, list) --|
//!     |         or ERROR             |
//! ```
//!
//! One connection carries exactly one exchange.
//!
//! # Message Framing
//!
//! Each message is prefixed with a 4-byte length field (little-endian u32):
//!
//! ```text
//! [4 bytes: message length][N bytes: MessagePack-serialized message]
//! ```

use crate::collector::EntityResult;
use crate::partition::PartitionPolicy;
use crate::source::WorkItem;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Protocol version
///
/// Coordinator and nodes must agree on it.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest accepted frame body
pub const MAX_MESSAGE_LEN: usize = 100 * 1024 * 1024;

/// Protocol message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    /// Work assignment (Coordinator → Node)
    ///
    /// Carries the full ordered work-item list; the node derives its own
    /// share from `(rank, world_size, policy)`.
    Assign(AssignMessage),

    /// Local results (Node → Coordinator)
    Results(ResultsMessage),

    /// Failure report (Node → Coordinator)
    Error(ErrorMessage),
}

/// Work assignment message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignMessage {
    pub protocol_version: u32,

    /// Rank of the receiving node in `0..world_size`
    pub rank: usize,
    pub world_size: usize,

    /// Partition policy across ranks (block or cyclic)
    pub policy: PartitionPolicy,

    /// Threads the node may use for its local share
    pub threads: usize,

    /// Local pool policy when `threads > 1`
    pub local_policy: PartitionPolicy,
    pub chunk_size: usize,

    pub items: Vec<WorkItem>,
}

/// Results message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsMessage {
    pub protocol_version: u32,
    pub rank: usize,

    /// Node identifier (hostname)
    pub node_id: String,

    /// Number of results this node announces
    pub local_count: usize,

    /// Results in local order
    pub results: Vec<EntityResult>,

    /// Local reduction time (nanoseconds)
    pub duration_ns: u64,
}

/// Error message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub rank: usize,
    pub node_id: String,
    pub error: String,
}

/// Serialize a message with its length prefix
///
/// # Message Format
///
/// ```text
/// [4 bytes: message length (little-endian u32)][N bytes: MessagePack message]
/// ```
pub fn serialize_message(msg: &Message) -> Result<Vec<u8>> {
    let msg_bytes = rmp_serde::to_vec(msg).context("Failed to serialize message")?;
    if msg_bytes.len() > MAX_MESSAGE_LEN {
        anyhow::bail!("Message too large: {} bytes (max 100MB)", msg_bytes.len());
    }

    let msg_len = msg_bytes.len() as u32;
    let mut framed = Vec::with_capacity(4 + msg_bytes.len());
    framed.extend_from_slice(&msg_len.to_le_bytes());
    framed.extend_from_slice(&msg_bytes);

    Ok(framed)
}

/// Deserialize one framed message from the front of `buf`
///
/// # Returns
///
/// The message and the number of bytes consumed.
pub fn deserialize_message(buf: &[u8]) -> Result<(Message, usize)> {
    let Some(len_bytes) = buf.get(..4) else {
        anyhow::bail!("Buffer too small for message length (need 4 bytes, got {})", buf.len());
    };
    let msg_len = u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;

    let Some(body) = buf.get(4..4 + msg_len) else {
        anyhow::bail!("Incomplete message (need {} bytes, got {})", 4 + msg_len, buf.len());
    };

    let msg = rmp_serde::from_slice(body).context("Failed to deserialize message")?;
    Ok((msg, 4 + msg_len))
}

/// Read one framed message from a stream
pub async fn read_message<R>(stream: &mut R) -> Result<Message>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    stream
        .read_exact(&mut len_buf)
        .await
        .context("Failed to read message length")?;

    let msg_len = u32::from_le_bytes(len_buf) as usize;
    if msg_len > MAX_MESSAGE_LEN {
        anyhow::bail!("Message too large: {} bytes (max 100MB)", msg_len);
    }

    let mut msg_buf = vec![0u8; msg_len];
    stream
        .read_exact(&mut msg_buf)
        .await
        .context("Failed to read message body")?;

    rmp_serde::from_slice(&msg_buf).context("Failed to deserialize message")
}

/// Write one framed message and flush
pub async fn write_message<W>(stream: &mut W, msg: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let framed = serialize_message(msg)?;
    stream.write_all(&framed).await.context("Failed to write message")?;
    stream.flush().await.context("Failed to flush stream")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::StatAccumulator;

    fn results_message() -> Message {
        let mut stats = StatAccumulator::new();
        stats.add_primary(12.5, Some(6));
        stats.total_records = 2;
        Message::Results(ResultsMessage {
            protocol_version: PROTOCOL_VERSION,
            rank: 3,
            node_id: "node-a".to_string(),
            local_count: 2,
            results: vec![
                EntityResult::new("Lima", stats),
                EntityResult::new("Quito", StatAccumulator::new()),
            ],
            duration_ns: 42,
        })
    }

    #[test]
    fn test_results_keep_accumulators() {
        let bytes = serialize_message(&results_message()).unwrap();
        let (msg, consumed) = deserialize_message(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());

        match msg {
            Message::Results(r) => {
                assert_eq!(r.rank, 3);
                assert_eq!(r.local_count, 2);
                assert_eq!(r.results[0].stats.buckets[6].sum, 12.5);
                assert_eq!(r.results[1].stats, StatAccumulator::IDENTITY);
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_assign_message() {
        let msg = Message::Assign(AssignMessage {
            protocol_version: PROTOCOL_VERSION,
            rank: 1,
            world_size: 4,
            policy: PartitionPolicy::Cyclic,
            threads: 2,
            local_policy: PartitionPolicy::Dynamic,
            chunk_size: 1,
            items: vec![WorkItem::new(0, "/data/Lima.csv", "Lima")],
        });
        let bytes = serialize_message(&msg).unwrap();
        let (back, _) = deserialize_message(&bytes).unwrap();

        match back {
            Message::Assign(a) => {
                assert_eq!(a.world_size, 4);
                assert_eq!(a.policy, PartitionPolicy::Cyclic);
                assert_eq!(a.items[0].entity, "Lima");
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_message_framing() {
        let msg = Message::Error(ErrorMessage {
            rank: 0,
            node_id: "n".to_string(),
            error: "boom".to_string(),
        });
        let bytes = serialize_message(&msg).unwrap();
        let msg_len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        assert_eq!(bytes.len(), 4 + msg_len);

        assert!(deserialize_message(&bytes[..2]).is_err());
        assert!(deserialize_message(&bytes[..bytes.len() - 1]).is_err());
    }

    #[tokio::test]
    async fn test_stream_roundtrip() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        write_message(&mut a, &results_message()).await.unwrap();
        match read_message(&mut b).await.unwrap() {
            Message::Results(r) => assert_eq!(r.node_id, "node-a"),
            _ => panic!("Wrong message type"),
        }
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        let len = (MAX_MESSAGE_LEN as u32 + 1).to_le_bytes();
        a.write_all(&len).await.unwrap();
        let err = read_message(&mut b).await.unwrap_err();
        assert!(err.to_string().contains("too large"));
    }
}
