use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::bundle::BundleTally;
use super::payload::ResultPayload;
use super::value_objects::{CountOfVoters, ResultAction, ResultState};
use crate::domain::shared::PoliticalBusinessType;

// ============================================================================
// Result Commands
// ============================================================================
//
// Commands carry everything the aggregate needs to decide, including the
// timestamps and policy outcomes resolved by the command handler, so that
// deciding stays a pure function of (state, command).
//
// ============================================================================

#[derive(Debug, Clone)]
pub enum ResultCommand {
    StartSubmission {
        counting_circle_id: Uuid,
        political_business_id: Uuid,
        business_type: PoliticalBusinessType,
        contest_id: Uuid,
        domain_of_influence_id: Uuid,
        testing_phase: bool,
    },
    EnterResults {
        expected_state: ResultState,
        payload: ResultPayload,
    },
    EnterCountOfVoters {
        count_of_voters: CountOfVoters,
    },
    FinishSubmission {
        at: DateTime<Utc>,
    },
    FlagForCorrection {
        comment: Option<String>,
    },
    FinishCorrection {
        at: DateTime<Utc>,
        comment: Option<String>,
    },
    AuditTentatively {
        at: DateTime<Utc>,
        publish_automatically: bool,
    },
    Plausibilise {
        at: DateTime<Utc>,
    },
    ResetToSubmissionFinished,
    ResetToAuditedTentatively,
    Finalize {
        at: DateTime<Utc>,
    },
    Reset,
    Publish {
        publish_automatically: bool,
    },
    Unpublish {
        publish_automatically: bool,
    },
    CreateBundle {
        bundle_id: Uuid,
        number: u32,
        created_by: String,
    },
    EnterBundleTally {
        bundle_id: Uuid,
        tally: BundleTally,
    },
    SubmitBundle {
        bundle_id: Uuid,
    },
    SucceedBundleReview {
        bundle_id: Uuid,
        reviewer: String,
    },
    RejectBundleReview {
        bundle_id: Uuid,
        reviewer: String,
    },
    DeleteBundle {
        bundle_id: Uuid,
    },
}

impl ResultCommand {
    pub fn action(&self) -> ResultAction {
        match self {
            ResultCommand::StartSubmission { .. } => ResultAction::StartSubmission,
            ResultCommand::EnterResults { .. } => ResultAction::EnterResults,
            ResultCommand::EnterCountOfVoters { .. } => ResultAction::EnterCountOfVoters,
            ResultCommand::FinishSubmission { .. } => ResultAction::SubmissionFinished,
            ResultCommand::FlagForCorrection { .. } => ResultAction::FlagForCorrection,
            ResultCommand::FinishCorrection { .. } => ResultAction::CorrectionFinished,
            ResultCommand::AuditTentatively { .. } => ResultAction::AuditedTentatively,
            ResultCommand::Plausibilise { .. } => ResultAction::Plausibilise,
            ResultCommand::ResetToSubmissionFinished => ResultAction::ResetToSubmissionFinished,
            ResultCommand::ResetToAuditedTentatively => ResultAction::ResetToAuditedTentatively,
            ResultCommand::Finalize { .. } => ResultAction::Finalize,
            ResultCommand::Reset => ResultAction::Reset,
            ResultCommand::Publish { .. } => ResultAction::Publish,
            ResultCommand::Unpublish { .. } => ResultAction::Unpublish,
            ResultCommand::CreateBundle { .. }
            | ResultCommand::EnterBundleTally { .. }
            | ResultCommand::SubmitBundle { .. }
            | ResultCommand::SucceedBundleReview { .. }
            | ResultCommand::RejectBundleReview { .. }
            | ResultCommand::DeleteBundle { .. } => ResultAction::Bundle,
        }
    }

    /// Builds the command for a payload-free lifecycle action.
    /// `None` for actions that need data (start, entries, bundles).
    pub fn for_transition(
        action: ResultAction,
        at: DateTime<Utc>,
        comment: Option<String>,
        publish_automatically: bool,
    ) -> Option<Self> {
        let command = match action {
            ResultAction::SubmissionFinished => ResultCommand::FinishSubmission { at },
            ResultAction::FlagForCorrection => ResultCommand::FlagForCorrection { comment },
            ResultAction::CorrectionFinished => ResultCommand::FinishCorrection { at, comment },
            ResultAction::AuditedTentatively => ResultCommand::AuditTentatively {
                at,
                publish_automatically,
            },
            ResultAction::Plausibilise => ResultCommand::Plausibilise { at },
            ResultAction::ResetToSubmissionFinished => ResultCommand::ResetToSubmissionFinished,
            ResultAction::ResetToAuditedTentatively => ResultCommand::ResetToAuditedTentatively,
            ResultAction::Finalize => ResultCommand::Finalize { at },
            ResultAction::Reset => ResultCommand::Reset,
            ResultAction::Publish => ResultCommand::Publish { publish_automatically },
            ResultAction::Unpublish => ResultCommand::Unpublish { publish_automatically },
            ResultAction::StartSubmission
            | ResultAction::EnterResults
            | ResultAction::EnterCountOfVoters
            | ResultAction::Bundle => return None,
        };
        Some(command)
    }
}
