use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event_sourcing::core::Actor;

// ============================================================================
// Event Log - append-only, per-stream ordered storage
// ============================================================================
//
// The log knows nothing about event types: payloads are opaque JSON text.
// Positions start at 1 and grow by exactly 1 per event.
//
// ============================================================================

/// One persisted event
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StoredEvent {
    pub stream_id: Uuid,
    pub position: i64,
    pub event_id: Uuid,
    pub event_type: String,
    pub event_version: i32,
    pub payload: String,
    pub causation_id: Option<Uuid>,
    pub correlation_id: Uuid,
    pub actor: Option<Actor>,
    pub timestamp: DateTime<Utc>,
    pub signature: Option<String>,
}

impl StoredEvent {
    /// Bytes covered by the business signature
    pub fn signing_bytes(&self) -> Vec<u8> {
        format!(
            "{}|{}|{}|{}|{}",
            self.stream_id, self.position, self.event_type, self.event_version, self.payload
        )
        .into_bytes()
    }
}

/// Events for one stream, guarded by the version the writer decided against
#[derive(Clone, Debug)]
pub struct StreamAppend {
    pub stream_id: Uuid,
    pub expected_version: i64,
    pub events: Vec<StoredEvent>,
}

#[derive(Debug, thiserror::Error)]
pub enum EventLogError {
    #[error("Concurrency conflict on stream {stream_id}: expected version {expected}, but current is {actual}")]
    ConcurrencyConflict {
        stream_id: Uuid,
        expected: i64,
        actual: i64,
    },

    #[error("Cannot append empty event list to stream {0}")]
    EmptyAppend(Uuid),

    #[error("Stream {0} appears more than once in one batch")]
    DuplicateStream(Uuid),

    #[error("Event positions for stream {stream_id} must continue at {expected}, got {got}")]
    PositionGap {
        stream_id: Uuid,
        expected: i64,
        got: i64,
    },

    #[error("Signature of event {position} in stream {stream_id} is invalid")]
    SignatureInvalid { stream_id: Uuid, position: i64 },

    #[error("Signing failed: {0}")]
    Signing(#[from] crate::event_sourcing::core::SignatureError),

    #[error("Replay of stream {stream_id} failed: {message}")]
    Replay { stream_id: Uuid, message: String },

    #[error("Event serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Event log backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl EventLogError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, EventLogError::ConcurrencyConflict { .. })
    }
}

#[async_trait]
pub trait EventLog: Send + Sync {
    /// Append all streams or none. Returns the new version of every stream,
    /// in input order.
    async fn append_batch(&self, appends: Vec<StreamAppend>) -> Result<Vec<i64>, EventLogError>;

    async fn read_stream(&self, stream_id: Uuid) -> Result<Vec<StoredEvent>, EventLogError>;

    /// 0 for a stream that does not exist yet
    async fn current_version(&self, stream_id: Uuid) -> Result<i64, EventLogError>;

    async fn append(&self, append: StreamAppend) -> Result<i64, EventLogError> {
        let versions = self.append_batch(vec![append]).await?;
        Ok(versions.into_iter().next().unwrap_or_default())
    }
}

/// Checks shared by every backend before anything is written
pub(crate) fn validate_append(append: &StreamAppend) -> Result<(), EventLogError> {
    if append.events.is_empty() {
        return Err(EventLogError::EmptyAppend(append.stream_id));
    }
    for (event, expected) in append.events.iter().zip(append.expected_version + 1..) {
        if event.position != expected || event.stream_id != append.stream_id {
            return Err(EventLogError::PositionGap {
                stream_id: append.stream_id,
                expected,
                got: event.position,
            });
        }
    }
    Ok(())
}
