// ============================================================================
// Event Sourcing Infrastructure
// ============================================================================
//
// Generic, reusable event sourcing infrastructure.
// Domain-specific code is in src/domain/ and src/apportionment/
//
// ============================================================================

pub mod core;
pub mod store;

pub use self::core::*;
pub use self::store::*;
