pub mod aggregate;
pub mod events;
pub mod value_objects;

pub use aggregate::{LotDecisionCommand, LotDecisionLog};
pub use events::{LotDecisionEvent, LotDecisionRecorded};
pub use value_objects::{Axis, LotChoice, LotDecision, LotDecisionContext, LotDecisions};
