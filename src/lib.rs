// ============================================================================
// Voting Tally - event-sourced result lifecycle, end results, apportionment
// ============================================================================

pub mod apportionment;
pub mod config;
pub mod domain;
pub mod error;
pub mod event_sourcing;
pub mod metrics;
pub mod service;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::TallyConfig;
pub use error::{ErrorKind, TallyError};
pub use service::{Collaborators, TallyService};
