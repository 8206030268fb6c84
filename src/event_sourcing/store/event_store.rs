use std::marker::PhantomData;
use std::sync::Arc;

use uuid::Uuid;

use super::event_log::{EventLog, EventLogError, StoredEvent, StreamAppend};
use crate::event_sourcing::core::{
    deserialize_event, serialize_event, Aggregate, DomainEvent, EventEnvelope, SignatureService,
};

// ============================================================================
// Generic Event Store - Repository for Events
// ============================================================================
//
// Typed view over the untyped event log.
//
// Type Parameter:
// - `E`: The domain event type (must implement DomainEvent trait)
//
// Responsibilities:
// 1. Serialize, sign and append envelopes (append-only)
// 2. Load and verify event history for aggregates
// 3. Surface optimistic concurrency conflicts untouched
//
// ============================================================================

pub struct EventStore<E: DomainEvent> {
    log: Arc<dyn EventLog>,
    signer: Arc<dyn SignatureService>,
    aggregate_type_name: String,
    _phantom: PhantomData<E>,
}

impl<E: DomainEvent> Clone for EventStore<E> {
    fn clone(&self) -> Self {
        Self {
            log: self.log.clone(),
            signer: self.signer.clone(),
            aggregate_type_name: self.aggregate_type_name.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<E: DomainEvent> EventStore<E> {
    pub fn new(log: Arc<dyn EventLog>, signer: Arc<dyn SignatureService>, aggregate_type_name: &str) -> Self {
        Self {
            log,
            signer,
            aggregate_type_name: aggregate_type_name.to_string(),
            _phantom: PhantomData,
        }
    }

    pub fn aggregate_type_name(&self) -> &str {
        &self.aggregate_type_name
    }

    /// Serialize and sign envelopes without writing them, for batched appends
    pub fn prepare(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[EventEnvelope<E>],
    ) -> Result<StreamAppend, EventLogError> {
        let mut records = Vec::with_capacity(events.len());

        for envelope in events {
            let mut record = StoredEvent {
                stream_id: aggregate_id,
                position: envelope.sequence_number,
                event_id: envelope.event_id,
                event_type: envelope.event_type.clone(),
                event_version: envelope.event_version,
                payload: serialize_event(&envelope.event_data)?,
                causation_id: envelope.causation_id,
                correlation_id: envelope.correlation_id,
                actor: envelope.actor.clone(),
                timestamp: envelope.timestamp,
                signature: None,
            };
            let signature = self.signer.attach_signature(&record.signing_bytes())?;
            if !signature.is_empty() {
                record.signature = Some(hex::encode(signature));
            }
            records.push(record);
        }

        Ok(StreamAppend {
            stream_id: aggregate_id,
            expected_version,
            events: records,
        })
    }

    /// Append events to the event store.
    /// Returns the new version number after appending.
    pub async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[EventEnvelope<E>],
    ) -> Result<i64, EventLogError> {
        let append = self.prepare(aggregate_id, expected_version, events)?;
        let new_version = self.log.append(append).await?;

        tracing::info!(
            aggregate_id = %aggregate_id,
            aggregate_type = %self.aggregate_type_name,
            new_version = new_version,
            event_count = events.len(),
            "Appended events to event store"
        );

        Ok(new_version)
    }

    /// Append prepared streams atomically
    pub async fn append_prepared(&self, appends: Vec<StreamAppend>) -> Result<Vec<i64>, EventLogError> {
        let stream_count = appends.len();
        let versions = self.log.append_batch(appends).await?;

        tracing::info!(
            aggregate_type = %self.aggregate_type_name,
            stream_count = stream_count,
            "Appended batch to event store"
        );

        Ok(versions)
    }

    /// Load all events for an aggregate, verifying signatures when a key is configured
    pub async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<EventEnvelope<E>>, EventLogError> {
        let records = self.log.read_stream(aggregate_id).await?;
        let public_key = self.signer.public_key();

        let mut events = Vec::with_capacity(records.len());
        for record in records {
            if let Some(key) = &public_key {
                let valid = record
                    .signature
                    .as_deref()
                    .and_then(|s| hex::decode(s).ok())
                    .is_some_and(|sig| self.signer.verify_signature(&record.signing_bytes(), &sig, key));
                if !valid {
                    return Err(EventLogError::SignatureInvalid {
                        stream_id: aggregate_id,
                        position: record.position,
                    });
                }
            }

            let event_data: E = deserialize_event(&record.payload)?;
            events.push(EventEnvelope {
                event_id: record.event_id,
                aggregate_id,
                sequence_number: record.position,
                event_type: record.event_type,
                event_version: record.event_version,
                event_data,
                causation_id: record.causation_id,
                correlation_id: record.correlation_id,
                actor: record.actor,
                timestamp: record.timestamp,
                signature: record.signature,
            });
        }

        tracing::debug!(aggregate_id = %aggregate_id, count = events.len(), "Loaded events");
        Ok(events)
    }

    pub async fn get_current_version(&self, aggregate_id: Uuid) -> Result<i64, EventLogError> {
        self.log.current_version(aggregate_id).await
    }

    /// Load aggregate by folding its stream; an empty stream is the initial state
    pub async fn load_aggregate<A>(&self, aggregate_id: Uuid) -> Result<A, EventLogError>
    where
        A: Aggregate<Event = E>,
        A::Error: std::fmt::Display,
    {
        let events = self.load_events(aggregate_id).await?;
        A::load_from_events(aggregate_id, &events).map_err(|e| EventLogError::Replay {
            stream_id: aggregate_id,
            message: e.to_string(),
        })
    }
}
