//! Multi-process wire protocol
//!
//! This module defines the messages exchanged between ranks in worker mode.
//! The protocol uses MessagePack (rmp-serde) so every record crosses the wire
//! as an explicit tagged schema, never as raw memory.
//!
//! # Protocol Version
//!
//! Current version: 1
//!
//! # Message Flow
//!
//! ```text
//! Rank k (k > 0)                  Rank 0
//!     |                              |
//!     |-------- HELLO(k) ----------->|
//!     |<------- WELCOME(size) -------|
//!     |                              |
//!     |    ... trials run locally ...|
//!     |                              |
//!     |-------- LOCAL_BEST --------->|   (tag 42, once per rank)
//!     |-------- BARRIER ------------>|
//!     |                              |   (after all W-1 barriers)
//!     |<------- RELEASE -------------|
//! ```
//!
//! # Message Framing
//!
//! Each message is prefixed with a 4-byte length field (little-endian u32):
//!
//! ```text
//! [4 bytes: message length][N bytes: MessagePack-serialized message]
//! ```

use crate::stats::{RunCounters, TrialResult};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Protocol version
///
/// Increment this when making breaking changes to the protocol.
/// All ranks of a run must have matching protocol versions.
pub const PROTOCOL_VERSION: u32 = 1;

/// Tag of the local-best exchange
pub const RESULT_TAG: u32 = 42;

/// Largest frame accepted from a peer
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Protocol messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    /// Connection handshake (rank k → rank 0)
    Hello(HelloMessage),

    /// Handshake reply (rank 0 → rank k)
    ///
    /// Carries rank 0's view of the world size so a misconfigured rank fails
    /// at connect time instead of at the reduction.
    Welcome { size: usize },

    /// A rank's local best and trial counts
    LocalBest(LocalBestMessage),

    /// Rank has reached the closing barrier (rank k → rank 0)
    Barrier { rank: usize },

    /// Every rank has reached the barrier (rank 0 → rank k)
    Release,

    /// Fatal error report, sent before closing the connection
    Error(ErrorMessage),
}

/// Hello message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloMessage {
    /// Protocol version (must match)
    pub protocol_version: u32,

    /// Sender's rank
    pub rank: usize,

    /// Sender's world size
    pub size: usize,

    /// Host the sender runs on
    pub node_id: String,
}

/// Local best message
///
/// The record is sent verbatim, the invalid sentinel included: rank 0 must
/// receive exactly one of these from every other rank.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalBestMessage {
    /// Exchange tag (always [`RESULT_TAG`])
    pub tag: u32,

    /// Sender's rank
    pub rank: usize,

    /// Sender's best result (`ok = false` if it had none)
    pub record: TrialResult,

    /// Sender's trial counts
    pub counters: RunCounters,
}

impl LocalBestMessage {
    pub fn new(rank: usize, record: TrialResult, counters: RunCounters) -> Self {
        Self {
            tag: RESULT_TAG,
            rank,
            record,
            counters,
        }
    }
}

/// Error message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Node identifier
    pub node_id: String,

    /// Error description
    pub error: String,
}

/// Host identifier for handshake messages
pub fn get_node_id() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Serialize a message to bytes
///
/// Prepends a 4-byte length field for framing.
pub fn serialize_message(msg: &Message) -> Result<Vec<u8>> {
    let msg_bytes = rmp_serde::to_vec(msg).context("Failed to serialize message")?;

    let msg_len = u32::try_from(msg_bytes.len()).context("Message too large to frame")?;
    let mut framed = Vec::with_capacity(4 + msg_bytes.len());
    framed.extend_from_slice(&msg_len.to_le_bytes());
    framed.extend_from_slice(&msg_bytes);

    Ok(framed)
}

/// Deserialize a message from bytes
///
/// Expects a 4-byte length prefix followed by a MessagePack-serialized message.
///
/// # Returns
///
/// Returns (message, bytes_consumed) where bytes_consumed includes the length prefix.
pub fn deserialize_message(buf: &[u8]) -> Result<(Message, usize)> {
    if buf.len() < 4 {
        anyhow::bail!("Buffer too small for message length (need 4 bytes, got {})", buf.len());
    }

    let msg_len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;

    if buf.len() < 4 + msg_len {
        anyhow::bail!("Incomplete message (need {} bytes, got {})", 4 + msg_len, buf.len());
    }

    let msg = rmp_serde::from_slice(&buf[4..4 + msg_len]).context("Failed to deserialize message")?;

    Ok((msg, 4 + msg_len))
}

/// Read one complete message from a stream
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
    if msg_len > MAX_FRAME_BYTES {
        anyhow::bail!("Message too large: {} bytes (max {})", msg_len, MAX_FRAME_BYTES);
    }

    let mut msg_buf = vec![0u8; msg_len];
    stream
        .read_exact(&mut msg_buf)
        .await
        .context("Failed to read message body")?;

    rmp_serde::from_slice(&msg_buf).context("Failed to deserialize message")
}

/// Write one message to a stream and flush it
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
    use crate::trial::Trial;

    fn record() -> TrialResult {
        TrialResult::success(
            17,
            31.330765069,
            121.998877,
            Trial {
                h0_km: 622.0,
                cd: 2.25,
                a2m: 0.02,
            },
        )
    }

    #[test]
    fn test_serialize_deserialize_hello() {
        let msg = Message::Hello(HelloMessage {
            protocol_version: PROTOCOL_VERSION,
            rank: 3,
            size: 8,
            node_id: "10.0.1.10".to_string(),
        });

        let bytes = serialize_message(&msg).unwrap();
        let (deserialized, consumed) = deserialize_message(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());

        match deserialized {
            Message::Hello(hello) => {
                assert_eq!(hello.protocol_version, PROTOCOL_VERSION);
                assert_eq!(hello.rank, 3);
                assert_eq!(hello.size, 8);
                assert_eq!(hello.node_id, "10.0.1.10");
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_local_best_keeps_every_field() {
        let mut counters = RunCounters::default();
        counters.record_success();
        counters.record_failure(crate::error::FailureKind::Engine);

        let sent = LocalBestMessage::new(2, record(), counters);
        let bytes = serialize_message(&Message::LocalBest(sent)).unwrap();

        match deserialize_message(&bytes).unwrap().0 {
            Message::LocalBest(received) => {
                assert_eq!(received, sent);
                assert_eq!(received.tag, RESULT_TAG);
                assert_eq!(
                    received.record.lifetime_days.to_bits(),
                    record().lifetime_days.to_bits()
                );
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_sentinel_travels_as_invalid() {
        let sent = LocalBestMessage::new(1, TrialResult::empty(), RunCounters::default());
        let bytes = serialize_message(&Message::LocalBest(sent)).unwrap();

        match deserialize_message(&bytes).unwrap().0 {
            Message::LocalBest(received) => assert!(!received.record.ok),
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_message_framing() {
        let bytes = serialize_message(&Message::Release).unwrap();

        assert!(bytes.len() >= 4);
        let msg_len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        assert_eq!(bytes.len(), 4 + msg_len);
    }

    #[test]
    fn test_incomplete_frame_rejected() {
        let bytes = serialize_message(&Message::Barrier { rank: 4 }).unwrap();
        assert!(deserialize_message(&bytes[..bytes.len() - 1]).is_err());
        assert!(deserialize_message(&bytes[..2]).is_err());
    }

    #[tokio::test]
    async fn test_stream_round_trip() {
        let (mut a, mut b) = tokio::io::duplex(4096);

        write_message(&mut a, &Message::Welcome { size: 5 }).await.unwrap();
        write_message(&mut a, &Message::Release).await.unwrap();

        assert!(matches!(read_message(&mut b).await.unwrap(), Message::Welcome { size: 5 }));
        assert!(matches!(read_message(&mut b).await.unwrap(), Message::Release));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        let len = (MAX_FRAME_BYTES as u32 + 1).to_le_bytes();
        a.write_all(&len).await.unwrap();

        let err = read_message(&mut b).await.unwrap_err();
        assert!(err.to_string().contains("too large"));
    }
}
