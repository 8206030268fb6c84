use uuid::Uuid;

use super::event::EventEnvelope;

// ============================================================================
// Aggregate Root Pattern - Event Sourcing Core
// ============================================================================
//
// Key Principles:
// 1. State is derived from events (not stored directly)
// 2. Commands are validated before emitting events
// 3. Events represent facts that have already happened
// 4. Aggregates enforce business invariants
// 5. All state changes flow through events
//
// Replay is a fold: start from `initial`, apply every event in stream order.
// A stream without events is the "not started" state at version 0.
//
// ============================================================================

/// Generic Aggregate trait - all event-sourced aggregates implement this
///
/// Type Parameters:
/// - `Event`: The domain event type for this aggregate
/// - `Command`: The command type for this aggregate
/// - `Error`: The error type for business rule violations
pub trait Aggregate: Sized + Send + Sync {
    type Event;
    type Command;
    type Error;

    /// Accumulator before the first event of the stream
    fn initial(aggregate_id: Uuid) -> Self;

    /// Apply an event to update state. Must be pure: no clocks, no I/O.
    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error>;

    /// Handle command and emit events (business logic)
    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    /// Get aggregate ID
    fn aggregate_id(&self) -> Uuid;

    /// Get current version (stream position of the last applied event)
    fn version(&self) -> i64;

    fn set_version(&mut self, version: i64);

    /// Reconstruct from event history
    fn load_from_events(
        aggregate_id: Uuid,
        events: &[EventEnvelope<Self::Event>],
    ) -> Result<Self, Self::Error> {
        events.iter().try_fold(Self::initial(aggregate_id), |mut aggregate, envelope| {
            aggregate.apply_event(&envelope.event_data)?;
            aggregate.set_version(envelope.sequence_number);
            Ok(aggregate)
        })
    }
}
