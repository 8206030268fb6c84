use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::payload::ResultPayload;

// ============================================================================
// Ballot Bundles - batches of ballots captured and reviewed individually
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BundleState {
    InProcess,
    ReadyForReview,
    Reviewed,
    InCorrection,
    Deleted,
}

impl BundleState {
    /// Neither reviewed nor deleted; blocks finishing the submission
    pub fn is_open(self) -> bool {
        !matches!(self, BundleState::Reviewed | BundleState::Deleted)
    }

    pub fn accepts_tally(self) -> bool {
        matches!(self, BundleState::InProcess | BundleState::InCorrection)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BundleAction {
    EnterTally,
    Submit,
    SucceedReview,
    RejectReview,
    Delete,
}

impl BundleAction {
    pub fn transition(self, from: BundleState) -> Option<BundleState> {
        use BundleState::*;
        match (self, from) {
            (BundleAction::EnterTally, InProcess | InCorrection) => Some(from),
            (BundleAction::Submit, InProcess | InCorrection) => Some(ReadyForReview),
            (BundleAction::SucceedReview, ReadyForReview) => Some(Reviewed),
            (BundleAction::RejectReview, ReadyForReview) => Some(InCorrection),
            (BundleAction::Delete, InProcess | ReadyForReview | InCorrection) => Some(Deleted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleTally {
    pub ballot_count: u64,
    pub votes: ResultPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotBundle {
    pub id: Uuid,
    /// Unique within the result
    pub number: u32,
    pub created_by: String,
    pub state: BundleState,
    pub tally: Option<BundleTally>,
    pub reviewed_by: Option<String>,
}

impl BallotBundle {
    pub fn new(id: Uuid, number: u32, created_by: String) -> Self {
        Self {
            id,
            number,
            created_by,
            state: BundleState::InProcess,
            tally: None,
            reviewed_by: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_cycle() {
        let mut state = BundleState::InProcess;
        for action in [
            BundleAction::Submit,
            BundleAction::RejectReview,
            BundleAction::EnterTally,
            BundleAction::Submit,
            BundleAction::SucceedReview,
        ] {
            state = action.transition(state).unwrap();
        }
        assert_eq!(state, BundleState::Reviewed);
        assert!(!state.is_open());
    }

    #[test]
    fn test_reviewed_and_deleted_bundles_are_frozen() {
        for action in [
            BundleAction::EnterTally,
            BundleAction::Submit,
            BundleAction::SucceedReview,
            BundleAction::RejectReview,
            BundleAction::Delete,
        ] {
            assert_eq!(action.transition(BundleState::Reviewed), None);
            assert_eq!(action.transition(BundleState::Deleted), None);
        }
    }
}
