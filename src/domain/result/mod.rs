pub mod aggregate;
pub mod bundle;
pub mod command_handler;
pub mod commands;
pub mod errors;
pub mod events;
pub mod payload;
pub mod value_objects;

pub use aggregate::ResultAggregate;
pub use bundle::{BallotBundle, BundleAction, BundleState, BundleTally};
pub use command_handler::ResultCommandHandler;
pub use commands::ResultCommand;
pub use errors::ResultError;
pub use events::ResultEvent;
pub use payload::*;
pub use value_objects::{CountOfVoters, ResultAction, ResultState};
