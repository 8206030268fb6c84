use uuid::Uuid;

use super::bundle::{BundleAction, BundleState};
use super::value_objects::{ResultAction, ResultState};
use crate::domain::end_result::EndResultError;
use crate::domain::shared::{PoliticalBusinessType, SecondFactorError};
use crate::event_sourcing::store::EventLogError;

// ============================================================================
// Result Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ResultError {
    #[error("Action {action} is not allowed in state {state}")]
    InvalidStateTransition { action: ResultAction, state: ResultState },

    #[error("Result is in state {actual}, expected {expected}")]
    ExpectedStateMismatch { expected: ResultState, actual: ResultState },

    #[error("Payload for a {got} does not match the {expected} of this result")]
    PayloadTypeMismatch {
        expected: PoliticalBusinessType,
        got: PoliticalBusinessType,
    },

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Count of voters does not add up to the received ballots")]
    InvalidCountOfVoters,

    #[error("Unknown ballot {0}")]
    UnknownBallot(Uuid),

    #[error("Unknown candidate {0}")]
    UnknownCandidate(Uuid),

    #[error("Unknown list {0}")]
    UnknownList(Uuid),

    #[error("result is already published")]
    AlreadyPublished,

    #[error("result is not published")]
    NotPublished,

    #[error("Results of this domain of influence are published automatically")]
    PublicationNotManual,

    #[error("{0} ballot bundles are neither reviewed nor deleted")]
    BundlesNotReviewed(usize),

    #[error("Ballot bundles are not supported for a {0}")]
    BundlesNotSupported(PoliticalBusinessType),

    #[error("Ballot bundle {0} not found")]
    BundleNotFound(Uuid),

    #[error("Ballot bundle {0} already exists")]
    BundleAlreadyExists(Uuid),

    #[error("Ballot bundle number {0} is already taken")]
    DuplicateBundleNumber(u32),

    #[error("Bundle action {action:?} is not allowed for bundle {bundle_id} in state {state:?}")]
    InvalidBundleTransition {
        bundle_id: Uuid,
        action: BundleAction,
        state: BundleState,
    },

    #[error("A bundle must be reviewed by someone other than its creator")]
    ReviewerIsCreator,

    #[error("Contest {0} is locked")]
    ContestLocked(Uuid),

    #[error("End result of political business {0} is finalized")]
    EndResultFinalized(Uuid),

    #[error("Result {0} appears more than once")]
    Duplicate(Uuid),

    #[error("Action {0} cannot be applied to many results at once")]
    NotBatchable(ResultAction),

    #[error("Action {0} needs data and cannot be requested as a plain transition")]
    NotATransition(ResultAction),

    #[error("Unknown political business {0}")]
    UnknownPoliticalBusiness(Uuid),

    #[error("Unknown counting circle {0}")]
    UnknownCountingCircle(Uuid),

    #[error("Political business {political_business_id} is not counted in counting circle {counting_circle_id}")]
    CountingCircleNotAssigned {
        political_business_id: Uuid,
        counting_circle_id: Uuid,
    },

    #[error("No policy for contest {0}")]
    UnknownContest(Uuid),

    #[error(transparent)]
    SecondFactor(#[from] SecondFactorError),

    #[error(transparent)]
    EndResult(#[from] EndResultError),

    #[error(transparent)]
    EventLog(#[from] EventLogError),
}
