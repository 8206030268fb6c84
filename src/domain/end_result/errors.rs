use uuid::Uuid;

use crate::domain::shared::SecondFactorError;
use crate::event_sourcing::store::EventLogError;
use crate::utils::IsTransient;

// ============================================================================
// End Result Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum EndResultError {
    #[error("End result of {political_business_id} changed concurrently: expected version {expected}, found {actual}")]
    VersionConflict {
        political_business_id: Uuid,
        expected: u64,
        actual: u64,
    },

    #[error("End result is incomplete: {done} of {total} counting circles are done")]
    Incomplete { done: u32, total: u32 },

    #[error("End result is already finalized")]
    AlreadyFinalized,

    #[error("End result is not finalized")]
    NotFinalized,

    #[error("End result of {0} is finalized")]
    Finalized(Uuid),

    #[error("End result finalization is disabled for this canton")]
    FinalizationDisabled,

    #[error("Contest {0} is locked")]
    ContestLocked(Uuid),

    #[error("Partial results of domain of influence {0} may not be viewed")]
    PartialViewNotPermitted(Uuid),

    #[error("Domain of influence {domain_of_influence_id} is not below political business {political_business_id}")]
    NotIntermediateDomainOfInfluence {
        political_business_id: Uuid,
        domain_of_influence_id: Uuid,
    },

    #[error("Unknown political business {0}")]
    UnknownPoliticalBusiness(Uuid),

    #[error("Unknown counting circle {0}")]
    UnknownCountingCircle(Uuid),

    #[error("No policy for contest {0}")]
    UnknownContest(Uuid),

    #[error("Counts do not fit into the end result totals")]
    CountOverflow,

    #[error("End result store failed: {0}")]
    Store(String),

    #[error("Snapshot of result {result_id} could not be built: {message}")]
    Snapshot { result_id: Uuid, message: String },

    #[error(transparent)]
    SecondFactor(#[from] SecondFactorError),

    #[error(transparent)]
    EventLog(#[from] EventLogError),
}

impl IsTransient for EndResultError {
    fn is_transient(&self) -> bool {
        match self {
            EndResultError::VersionConflict { .. } => true,
            EndResultError::EventLog(e) => e.is_conflict(),
            _ => false,
        }
    }
}
