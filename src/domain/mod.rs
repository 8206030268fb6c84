// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Tallying aggregates and business rules. Each aggregate kind has its own
// subdirectory with:
// - Value objects
// - Events
// - Commands
// - Errors
// - Aggregate implementation
// - Command handler
//
// This layer is completely separate from the event sourcing infrastructure.
//
// ============================================================================

pub mod shared;
pub mod result;
pub mod end_result;
