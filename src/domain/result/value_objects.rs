use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Result Lifecycle - States and Actions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultState {
    /// No event recorded yet
    Initial,
    SubmissionOngoing,
    SubmissionDone,
    ReadyForCorrection,
    CorrectionDone,
    AuditedTentatively,
    Plausibilised,
    Finalized,
}

impl ResultState {
    pub const ALL: [ResultState; 8] = [
        ResultState::Initial,
        ResultState::SubmissionOngoing,
        ResultState::SubmissionDone,
        ResultState::ReadyForCorrection,
        ResultState::CorrectionDone,
        ResultState::AuditedTentatively,
        ResultState::Plausibilised,
        ResultState::Finalized,
    ];

    /// Results in these states contribute to the end result
    pub fn is_done(self) -> bool {
        matches!(
            self,
            ResultState::AuditedTentatively | ResultState::Plausibilised | ResultState::Finalized
        )
    }

    /// Entered data and bundles may change
    pub fn accepts_entries(self) -> bool {
        matches!(self, ResultState::SubmissionOngoing | ResultState::ReadyForCorrection)
    }
}

impl fmt::Display for ResultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultAction {
    StartSubmission,
    EnterResults,
    EnterCountOfVoters,
    SubmissionFinished,
    FlagForCorrection,
    CorrectionFinished,
    AuditedTentatively,
    Plausibilise,
    ResetToSubmissionFinished,
    ResetToAuditedTentatively,
    Finalize,
    Reset,
    Publish,
    Unpublish,
    Bundle,
}

impl ResultAction {
    pub const ALL: [ResultAction; 15] = [
        ResultAction::StartSubmission,
        ResultAction::EnterResults,
        ResultAction::EnterCountOfVoters,
        ResultAction::SubmissionFinished,
        ResultAction::FlagForCorrection,
        ResultAction::CorrectionFinished,
        ResultAction::AuditedTentatively,
        ResultAction::Plausibilise,
        ResultAction::ResetToSubmissionFinished,
        ResultAction::ResetToAuditedTentatively,
        ResultAction::Finalize,
        ResultAction::Reset,
        ResultAction::Publish,
        ResultAction::Unpublish,
        ResultAction::Bundle,
    ];

    /// Source states from which the action is allowed
    pub fn allowed_from(self) -> &'static [ResultState] {
        use ResultState::*;
        match self {
            ResultAction::StartSubmission => &[Initial],
            ResultAction::EnterResults | ResultAction::EnterCountOfVoters | ResultAction::Bundle => {
                &[SubmissionOngoing, ReadyForCorrection]
            }
            ResultAction::SubmissionFinished => &[SubmissionOngoing],
            ResultAction::FlagForCorrection => &[SubmissionDone, CorrectionDone],
            ResultAction::CorrectionFinished => &[ReadyForCorrection],
            ResultAction::AuditedTentatively => &[SubmissionDone, CorrectionDone],
            ResultAction::Plausibilise => &[AuditedTentatively],
            ResultAction::ResetToSubmissionFinished => &[AuditedTentatively, Plausibilised],
            ResultAction::ResetToAuditedTentatively => &[Plausibilised],
            ResultAction::Finalize => &[Plausibilised],
            ResultAction::Reset => &[
                SubmissionOngoing,
                SubmissionDone,
                ReadyForCorrection,
                CorrectionDone,
                AuditedTentatively,
                Plausibilised,
            ],
            ResultAction::Publish | ResultAction::Unpublish => &[AuditedTentatively, Plausibilised, Finalized],
        }
    }

    /// Target state, or `None` when the action is not allowed from `from`
    pub fn transition(self, from: ResultState) -> Option<ResultState> {
        if !self.allowed_from().contains(&from) {
            return None;
        }
        let target = match self {
            ResultAction::StartSubmission | ResultAction::Reset => ResultState::SubmissionOngoing,
            ResultAction::SubmissionFinished | ResultAction::ResetToSubmissionFinished => ResultState::SubmissionDone,
            ResultAction::FlagForCorrection => ResultState::ReadyForCorrection,
            ResultAction::CorrectionFinished => ResultState::CorrectionDone,
            ResultAction::AuditedTentatively | ResultAction::ResetToAuditedTentatively => {
                ResultState::AuditedTentatively
            }
            ResultAction::Plausibilise => ResultState::Plausibilised,
            ResultAction::Finalize => ResultState::Finalized,
            ResultAction::EnterResults
            | ResultAction::EnterCountOfVoters
            | ResultAction::Publish
            | ResultAction::Unpublish
            | ResultAction::Bundle => from,
        };
        Some(target)
    }

    pub fn requires_second_factor(self) -> bool {
        matches!(self, ResultAction::SubmissionFinished | ResultAction::CorrectionFinished)
    }

    /// Actions accepted by batch transitions
    pub fn is_batchable(self) -> bool {
        matches!(self, ResultAction::AuditedTentatively | ResultAction::Plausibilise)
    }
}

impl fmt::Display for ResultAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Count of voters reported together with the ballots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountOfVoters {
    pub received_ballots: u64,
    pub accounted_ballots: u64,
    pub blank_ballots: u64,
    pub invalid_ballots: u64,
}

impl CountOfVoters {
    pub fn is_consistent(&self) -> bool {
        self.accounted_ballots
            .checked_add(self.blank_ballots)
            .and_then(|n| n.checked_add(self.invalid_ballots))
            == Some(self.received_ballots)
    }

    /// Field-wise sum, `None` if any field overflows
    pub fn checked_add(&self, other: &CountOfVoters) -> Option<CountOfVoters> {
        Some(CountOfVoters {
            received_ballots: self.received_ballots.checked_add(other.received_ballots)?,
            accounted_ballots: self.accounted_ballots.checked_add(other.accounted_ballots)?,
            blank_ballots: self.blank_ballots.checked_add(other.blank_ballots)?,
            invalid_ballots: self.invalid_ballots.checked_add(other.invalid_ballots)?,
        })
    }
}
