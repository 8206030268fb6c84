// ============================================================================
// Shared Domain Concepts
// ============================================================================
//
// Identifiers, contest policy, contest setup catalog and the collaborator
// ports (second factor, partial-result visibility) used by more than one
// aggregate.
//
// ============================================================================

pub mod catalog;
pub mod ids;
pub mod policy;
pub mod second_factor;
pub mod value_objects;
pub mod visibility;

pub use catalog::*;
pub use ids::*;
pub use policy::*;
pub use second_factor::*;
pub use value_objects::*;
pub use visibility::*;
