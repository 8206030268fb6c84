use uuid::Uuid;

use super::lot_decision::LotDecisionContext;
use crate::event_sourcing::store::EventLogError;

#[derive(Debug, thiserror::Error)]
pub enum ApportionmentError {
    #[error("District {0} has seats to distribute but no eligible votes")]
    DistrictWithoutVotes(Uuid),

    #[error("No votes to apportion")]
    NoVotes,

    #[error("No list passed the quorum")]
    NoListPassedQuorum,

    #[error("Exact arithmetic overflowed")]
    ArithmeticOverflow,

    #[error("Union list {union_list_id} refers to an unknown district {district_id}")]
    UnknownDistrict { union_list_id: Uuid, district_id: Uuid },

    #[error("Apportionment did not converge after {iterations} iterations ({} lot decision(s) pending)", pending.len())]
    NonConvergence {
        iterations: u32,
        pending: Vec<LotDecisionContext>,
    },

    #[error("No proportional election or union with id {0}")]
    UnknownSubject(Uuid),

    #[error("Political business {0} is not a proportional election")]
    NotProportional(Uuid),

    #[error("Contest {0} not found")]
    UnknownContest(Uuid),

    #[error("End result of {political_business_id} is incomplete ({done}/{total} counting circles)")]
    EndResultIncomplete {
        political_business_id: Uuid,
        done: u32,
        total: u32,
    },

    #[error("Contest {0} is locked")]
    ContestLocked(Uuid),

    #[error("A lot decision for this context is already recorded")]
    LotDecisionAlreadyRecorded,

    #[error("No pending lot decision matches this context")]
    LotDecisionNotPending,

    #[error("Invalid lot choice: {0}")]
    InvalidLotChoice(String),

    #[error(transparent)]
    EndResult(#[from] crate::domain::end_result::EndResultError),

    #[error(transparent)]
    EventLog(#[from] EventLogError),
}
