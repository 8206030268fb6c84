use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

// ============================================================================
// Event Envelope - Event Metadata
// ============================================================================
//
// Wraps domain events with metadata for proper event sourcing.
// This is GENERIC and works with ANY event type.
//
// ============================================================================

/// The user and tenant an event is attributed to
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub tenant_id: String,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            tenant_id: tenant_id.into(),
        }
    }

    /// Events emitted by the engine itself (automatic publication, projections)
    pub fn system() -> Self {
        Self::new("system", "system")
    }
}

/// Generic Event Envelope - wraps any domain event with metadata
///
/// Type Parameter:
/// - `E`: The domain event type (must implement DomainEvent trait)
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EventEnvelope<E> {
    // Event Identity
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    pub sequence_number: i64,

    // Event Type Information
    pub event_type: String,
    pub event_version: i32,

    // Event Payload
    pub event_data: E,

    // Causation & Correlation
    pub causation_id: Option<Uuid>,
    pub correlation_id: Uuid,

    pub actor: Option<Actor>,

    pub timestamp: DateTime<Utc>,

    /// Hex-encoded business signature attached at append time
    pub signature: Option<String>,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        aggregate_id: Uuid,
        sequence_number: i64,
        event_type: String,
        event_data: E,
        correlation_id: Uuid,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            aggregate_id,
            sequence_number,
            event_type,
            event_version: 1,
            event_data,
            causation_id: None,
            correlation_id,
            actor: None,
            timestamp: Utc::now(),
            signature: None,
        }
    }

    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }
}

// ============================================================================
// Domain Event Trait
// ============================================================================

/// All domain events implement this trait to be used with the event store.
pub trait DomainEvent: Serialize + for<'de> Deserialize<'de> + Clone + Send + Sync {
    /// Name of the concrete event variant, stored next to the payload
    fn event_type(&self) -> &'static str;

    fn event_version(&self) -> i32 {
        1
    }
}

/// Wrap freshly decided events into envelopes continuing after `expected_version`
pub fn wrap_events<E: DomainEvent>(
    aggregate_id: Uuid,
    expected_version: i64,
    events: Vec<E>,
    correlation_id: Uuid,
    actor: &Actor,
) -> Vec<EventEnvelope<E>> {
    events
        .into_iter()
        .zip(expected_version + 1..)
        .map(|(event, seq)| {
            let event_type = event.event_type().to_string();
            let event_version = event.event_version();
            let mut envelope = EventEnvelope::new(aggregate_id, seq, event_type, event, correlation_id)
                .with_actor(actor.clone());
            envelope.event_version = event_version;
            envelope
        })
        .collect()
}

// ============================================================================
// Event Serialization Helpers
// ============================================================================

pub fn serialize_event<E: Serialize>(event: &E) -> serde_json::Result<String> {
    serde_json::to_string(event)
}

pub fn deserialize_event<E: for<'de> Deserialize<'de>>(json: &str) -> serde_json::Result<E> {
    serde_json::from_str(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Clone, Debug)]
    #[serde(tag = "type", content = "data")]
    enum TestEvent {
        Opened { label: String },
        Closed,
    }

    impl DomainEvent for TestEvent {
        fn event_type(&self) -> &'static str {
            match self {
                TestEvent::Opened { .. } => "TestOpened",
                TestEvent::Closed => "TestClosed",
            }
        }
    }

    #[test]
    fn test_event_envelope_creation() {
        let aggregate_id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();

        let envelope = EventEnvelope::new(
            aggregate_id,
            1,
            "TestClosed".to_string(),
            TestEvent::Closed,
            correlation_id,
        );

        assert_eq!(envelope.aggregate_id, aggregate_id);
        assert_eq!(envelope.sequence_number, 1);
        assert_eq!(envelope.event_type, "TestClosed");
        assert_eq!(envelope.correlation_id, correlation_id);
        assert!(envelope.actor.is_none());
    }

    #[test]
    fn test_wrap_events_continues_sequence() {
        let aggregate_id = Uuid::new_v4();
        let actor = Actor::new("erfasser", "bern");
        let envelopes = wrap_events(
            aggregate_id,
            4,
            vec![TestEvent::Opened { label: "a".into() }, TestEvent::Closed],
            Uuid::new_v4(),
            &actor,
        );

        assert_eq!(envelopes.len(), 2);
        assert_eq!(envelopes[0].sequence_number, 5);
        assert_eq!(envelopes[0].event_type, "TestOpened");
        assert_eq!(envelopes[1].sequence_number, 6);
        assert_eq!(envelopes[1].event_type, "TestClosed");
        assert_eq!(envelopes[1].actor.as_ref(), Some(&actor));
    }

    #[test]
    fn test_event_serialization() {
        let json = serialize_event(&TestEvent::Opened { label: "x".into() }).unwrap();
        assert!(json.contains("Opened"));
        let back: TestEvent = deserialize_event(&json).unwrap();
        assert!(matches!(back, TestEvent::Opened { label } if label == "x"));
    }
}
