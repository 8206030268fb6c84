use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::statement::batch::Batch;
use uuid::Uuid;

use super::event_log::{validate_append, EventLog, EventLogError, StoredEvent, StreamAppend};
use crate::event_sourcing::core::Actor;

// ============================================================================
// ScyllaDB Event Log - durable backend
// ============================================================================
//
// One partition per stream. `current_position` is a static column, so the
// optimistic version check and the event rows live in the same partition
// and can be written by one conditional (LWT) batch: either the condition
// holds and every row lands, or nothing is written.
//
// Cross-stream batches are appended stream by stream; ScyllaDB cannot make
// a conditional batch span partitions.
//
// ============================================================================

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS event_log (
    stream_id uuid,
    position bigint,
    current_position bigint static,
    event_id uuid,
    event_type text,
    event_version int,
    payload text,
    causation_id uuid,
    correlation_id uuid,
    actor text,
    timestamp timestamp,
    signature text,
    PRIMARY KEY (stream_id, position)
) WITH CLUSTERING ORDER BY (position ASC)";

const UPSERT_EVENT: &str = "UPDATE event_log SET
    current_position = ?, event_id = ?, event_type = ?, event_version = ?, payload = ?,
    causation_id = ?, correlation_id = ?, actor = ?, timestamp = ?, signature = ?
    WHERE stream_id = ? AND position = ?";

type EventRow = (
    i64,
    Uuid,
    String,
    i32,
    String,
    Option<Uuid>,
    Uuid,
    Option<String>,
    DateTime<Utc>,
    Option<String>,
);

type UpsertValues = (
    i64,
    Uuid,
    String,
    i32,
    String,
    Option<Uuid>,
    Uuid,
    Option<String>,
    DateTime<Utc>,
    Option<String>,
    Uuid,
    i64,
);

pub struct ScyllaEventLog {
    session: Arc<Session>,
}

impl ScyllaEventLog {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Connect, create the keyspace and table if missing
    pub async fn connect(known_node: &str, keyspace: &str, replication_factor: u32) -> anyhow::Result<Self> {
        tracing::info!(known_node = %known_node, keyspace = %keyspace, "Connecting to ScyllaDB");

        let session: Session = SessionBuilder::new().known_node(known_node).build().await?;

        session
            .query_unpaged(
                format!(
                    "CREATE KEYSPACE IF NOT EXISTS {keyspace} WITH REPLICATION = \
                     {{'class': 'SimpleStrategy', 'replication_factor': {replication_factor}}}"
                ),
                &[],
            )
            .await?;
        session.use_keyspace(keyspace, false).await?;
        session.query_unpaged(CREATE_TABLE, &[]).await?;

        Ok(Self::new(Arc::new(session)))
    }

    async fn append_stream(&self, append: &StreamAppend) -> Result<i64, EventLogError> {
        let new_version = append.expected_version + append.events.len() as i64;

        let mut batch = Batch::default();
        let mut values: Vec<UpsertValues> = Vec::with_capacity(append.events.len());

        for (index, event) in append.events.iter().enumerate() {
            if index == 0 {
                // Guard clause of the LWT batch
                let condition = if append.expected_version == 0 {
                    "IF current_position = null".to_string()
                } else {
                    format!("IF current_position = {}", append.expected_version)
                };
                batch.append_statement(format!("{UPSERT_EVENT} {condition}").as_str());
            } else {
                batch.append_statement(UPSERT_EVENT);
            }

            let actor = event
                .actor
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;

            values.push((
                new_version,
                event.event_id,
                event.event_type.clone(),
                event.event_version,
                event.payload.clone(),
                event.causation_id,
                event.correlation_id,
                actor,
                event.timestamp,
                event.signature.clone(),
                append.stream_id,
                event.position,
            ));
        }

        self.session
            .batch(&batch, values)
            .await
            .context("event log batch failed")?;

        // The LWT outcome is read back instead of parsed from the batch
        // result: our first event either sits at its position or it doesn't.
        let first = &append.events[0];
        let stored_id = self.event_id_at(append.stream_id, first.position).await?;
        if stored_id != Some(first.event_id) {
            let actual = self.current_version(append.stream_id).await?;
            return Err(EventLogError::ConcurrencyConflict {
                stream_id: append.stream_id,
                expected: append.expected_version,
                actual,
            });
        }

        tracing::info!(
            stream_id = %append.stream_id,
            new_version = new_version,
            event_count = append.events.len(),
            "Appended events to ScyllaDB event log"
        );

        Ok(new_version)
    }

    async fn event_id_at(&self, stream_id: Uuid, position: i64) -> Result<Option<Uuid>, EventLogError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT event_id FROM event_log WHERE stream_id = ? AND position = ?",
                (stream_id, position),
            )
            .await
            .context("event lookup failed")?;

        let rows_result = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(None),
        };

        match rows_result.maybe_first_row::<(Option<Uuid>,)>() {
            Ok(Some((event_id,))) => Ok(event_id),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl EventLog for ScyllaEventLog {
    async fn append_batch(&self, appends: Vec<StreamAppend>) -> Result<Vec<i64>, EventLogError> {
        for append in &appends {
            validate_append(append)?;
            let actual = self.current_version(append.stream_id).await?;
            if actual != append.expected_version {
                return Err(EventLogError::ConcurrencyConflict {
                    stream_id: append.stream_id,
                    expected: append.expected_version,
                    actual,
                });
            }
        }

        let mut versions = Vec::with_capacity(appends.len());
        for append in &appends {
            versions.push(self.append_stream(append).await?);
        }
        Ok(versions)
    }

    async fn read_stream(&self, stream_id: Uuid) -> Result<Vec<StoredEvent>, EventLogError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT position, event_id, event_type, event_version, payload,
                        causation_id, correlation_id, actor, timestamp, signature
                 FROM event_log
                 WHERE stream_id = ?
                 ORDER BY position ASC",
                (stream_id,),
            )
            .await
            .context("event log read failed")?;

        let mut events = Vec::new();

        let rows_result = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(events),
        };

        let rows = rows_result
            .rows::<EventRow>()
            .context("unexpected event_log row shape")?;

        for row in rows {
            let (position, event_id, event_type, event_version, payload, causation_id, correlation_id, actor, timestamp, signature) =
                row.context("event_log row deserialization failed")?;

            let actor: Option<Actor> = actor.as_deref().map(serde_json::from_str).transpose()?;

            events.push(StoredEvent {
                stream_id,
                position,
                event_id,
                event_type,
                event_version,
                payload,
                causation_id,
                correlation_id,
                actor,
                timestamp,
                signature,
            });
        }

        tracing::debug!(stream_id = %stream_id, count = events.len(), "Loaded events from ScyllaDB");
        Ok(events)
    }

    async fn current_version(&self, stream_id: Uuid) -> Result<i64, EventLogError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT current_position FROM event_log WHERE stream_id = ? LIMIT 1",
                (stream_id,),
            )
            .await
            .context("version lookup failed")?;

        let rows_result = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(0),
        };

        match rows_result.maybe_first_row::<(Option<i64>,)>() {
            Ok(Some((Some(version),))) => Ok(version),
            _ => Ok(0),
        }
    }
}
