use crate::apportionment::{ApportionmentError, LotDecisionContext};
use crate::domain::end_result::EndResultError;
use crate::domain::result::ResultError;
use crate::domain::shared::SecondFactorError;
use crate::event_sourcing::store::EventLogError;

// ============================================================================
// Top-Level Error Taxonomy
// ============================================================================
//
// Module errors stay where they are raised; callers of the facade only need
// to know which kind of failure they got.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    StateConflict,
    ConcurrencyConflict,
    Authorization,
    NonConvergence,
    Infrastructure,
}

#[derive(Debug, thiserror::Error)]
pub enum TallyError {
    #[error(transparent)]
    Result(#[from] ResultError),

    #[error(transparent)]
    EndResult(#[from] EndResultError),

    #[error(transparent)]
    Apportionment(#[from] ApportionmentError),

    #[error(transparent)]
    EventLog(#[from] EventLogError),

    #[error(transparent)]
    SecondFactor(#[from] SecondFactorError),
}

impl TallyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TallyError::Result(e) => result_kind(e),
            TallyError::EndResult(e) => end_result_kind(e),
            TallyError::Apportionment(e) => apportionment_kind(e),
            TallyError::EventLog(e) => event_log_kind(e),
            TallyError::SecondFactor(e) => second_factor_kind(e),
        }
    }

    /// Lot decisions an apportionment is waiting for
    pub fn pending_lot_decisions(&self) -> &[LotDecisionContext] {
        match self {
            TallyError::Apportionment(ApportionmentError::NonConvergence { pending, .. }) => pending,
            _ => &[],
        }
    }
}

fn event_log_kind(error: &EventLogError) -> ErrorKind {
    if error.is_conflict() {
        ErrorKind::ConcurrencyConflict
    } else {
        ErrorKind::Infrastructure
    }
}

fn second_factor_kind(error: &SecondFactorError) -> ErrorKind {
    match error {
        SecondFactorError::Hashing(_) => ErrorKind::Infrastructure,
        _ => ErrorKind::Authorization,
    }
}

fn result_kind(error: &ResultError) -> ErrorKind {
    use ResultError::*;
    match error {
        InvalidStateTransition { .. }
        | ExpectedStateMismatch { .. }
        | AlreadyPublished
        | NotPublished
        | PublicationNotManual
        | BundlesNotReviewed(_)
        | BundleAlreadyExists(_)
        | DuplicateBundleNumber(_)
        | InvalidBundleTransition { .. }
        | EndResultFinalized(_)
        | Duplicate(_) => ErrorKind::StateConflict,

        ContestLocked(_) | ReviewerIsCreator => ErrorKind::Authorization,

        PayloadTypeMismatch { .. }
        | InvalidPayload(_)
        | InvalidCountOfVoters
        | UnknownBallot(_)
        | UnknownCandidate(_)
        | UnknownList(_)
        | BundlesNotSupported(_)
        | BundleNotFound(_)
        | NotBatchable(_)
        | NotATransition(_)
        | UnknownPoliticalBusiness(_)
        | UnknownCountingCircle(_)
        | CountingCircleNotAssigned { .. }
        | UnknownContest(_) => ErrorKind::Validation,

        SecondFactor(e) => second_factor_kind(e),
        EndResult(e) => end_result_kind(e),
        EventLog(e) => event_log_kind(e),
    }
}

fn end_result_kind(error: &EndResultError) -> ErrorKind {
    use EndResultError::*;
    match error {
        VersionConflict { .. } => ErrorKind::ConcurrencyConflict,
        Incomplete { .. } | AlreadyFinalized | NotFinalized | Finalized(_) => ErrorKind::StateConflict,
        FinalizationDisabled | ContestLocked(_) | PartialViewNotPermitted(_) => ErrorKind::Authorization,
        NotIntermediateDomainOfInfluence { .. }
        | UnknownPoliticalBusiness(_)
        | UnknownCountingCircle(_)
        | UnknownContest(_)
        | CountOverflow => ErrorKind::Validation,
        Store(_) | Snapshot { .. } => ErrorKind::Infrastructure,
        SecondFactor(e) => second_factor_kind(e),
        EventLog(e) => event_log_kind(e),
    }
}

fn apportionment_kind(error: &ApportionmentError) -> ErrorKind {
    use ApportionmentError::*;
    match error {
        NonConvergence { .. } => ErrorKind::NonConvergence,
        EndResultIncomplete { .. } | LotDecisionAlreadyRecorded | LotDecisionNotPending => ErrorKind::StateConflict,
        ContestLocked(_) => ErrorKind::Authorization,
        DistrictWithoutVotes(_)
        | NoVotes
        | NoListPassedQuorum
        | UnknownDistrict { .. }
        | UnknownSubject(_)
        | NotProportional(_)
        | UnknownContest(_)
        | InvalidLotChoice(_) => ErrorKind::Validation,
        ArithmeticOverflow => ErrorKind::Infrastructure,
        EndResult(e) => end_result_kind(e),
        EventLog(e) => event_log_kind(e),
    }
}
