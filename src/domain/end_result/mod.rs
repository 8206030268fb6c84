pub mod aggregate;
pub mod aggregator;
pub mod errors;
pub mod events;
pub mod model;
pub mod reduction;
pub mod store;

pub use aggregate::{EndResultFinalization, FinalizationCommand};
pub use aggregator::EndResultAggregator;
pub use errors::EndResultError;
pub use events::EndResultEvent;
pub use model::{Contribution, EndResult, EndResultView, ViewScope};
pub use reduction::*;
pub use store::{EndResultStore, InMemoryEndResultStore};
