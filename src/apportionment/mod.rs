// ============================================================================
// Biproportional Apportionment
// ============================================================================
//
// Seats of a proportional election union are distributed in two steps: the
// super-apportionment hands the union's seats to union lists by voter
// numbers, the sub-apportionment spreads those seats over the districts so
// both marginals hold. Candidates are then elected inside every list.
//
// Arithmetic is exact (`rational`); divisors are reported as decimals.
//
// ============================================================================

mod candidates;
pub mod divisor;
pub mod engine;
pub mod errors;
pub mod lot_decision;
pub mod model;
pub mod quorum;
pub mod rational;
pub mod service;
mod sub_apportionment;
mod super_apportionment;

pub use engine::apportion;
pub use errors::ApportionmentError;
pub use lot_decision::*;
pub use model::*;
pub use service::ApportionmentService;
