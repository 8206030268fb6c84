// ============================================================================
// Event Sourcing Store - Generic Persistence Layer
// ============================================================================
//
// `EventLog` is the storage port; `EventStore<E>` is the typed repository
// every command handler talks to.
//
// ============================================================================

pub mod event_log;
pub mod event_store;
pub mod memory;
pub mod scylla_log;

pub use event_log::{EventLog, EventLogError, StoredEvent, StreamAppend};
pub use event_store::EventStore;
pub use memory::InMemoryEventLog;
pub use scylla_log::ScyllaEventLog;
