// ============================================================================
// Event Sourcing Core - Generic Infrastructure Abstractions
// ============================================================================
//
// GENERIC, reusable event sourcing infrastructure that works with ANY
// domain aggregate. No counting circles, ballots or seats in here.
//
// ============================================================================

pub mod aggregate;
pub mod event;
pub mod signature;

pub use aggregate::Aggregate;
pub use event::{deserialize_event, serialize_event, wrap_events, Actor, DomainEvent, EventEnvelope};
pub use signature::{SignatureError, SignatureService, UnsignedEvents};
