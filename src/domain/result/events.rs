use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::bundle::BundleTally;
use super::payload::ResultPayload;
use super::value_objects::CountOfVoters;
use crate::domain::shared::PoliticalBusinessType;
use crate::event_sourcing::core::DomainEvent;

// ============================================================================
// Result Events - facts of one counting-circle result
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ResultEvent {
    SubmissionStarted(SubmissionStarted),
    ResultsEntered(ResultsEntered),
    CountOfVotersEntered(CountOfVotersEntered),
    SubmissionFinished(StateChangedAt),
    FlaggedForCorrection(FlaggedForCorrection),
    CorrectionFinished(CorrectionFinished),
    AuditedTentatively(StateChangedAt),
    Plausibilised(StateChangedAt),
    ResettedToSubmissionFinished,
    ResettedToAuditedTentatively,
    Finalized(StateChangedAt),
    Resetted,
    Published,
    Unpublished,
    BundleCreated(BundleCreated),
    BundleTallyEntered(BundleTallyEntered),
    BundleSubmitted(BundleRef),
    BundleReviewSucceeded(BundleReviewed),
    BundleReviewRejected(BundleReviewed),
    BundleDeleted(BundleRef),
}

impl DomainEvent for ResultEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ResultEvent::SubmissionStarted(_) => "ResultSubmissionStarted",
            ResultEvent::ResultsEntered(_) => "ResultEntered",
            ResultEvent::CountOfVotersEntered(_) => "ResultCountOfVotersEntered",
            ResultEvent::SubmissionFinished(_) => "ResultSubmissionFinished",
            ResultEvent::FlaggedForCorrection(_) => "ResultFlaggedForCorrection",
            ResultEvent::CorrectionFinished(_) => "ResultCorrectionFinished",
            ResultEvent::AuditedTentatively(_) => "ResultAuditedTentatively",
            ResultEvent::Plausibilised(_) => "ResultPlausibilised",
            ResultEvent::ResettedToSubmissionFinished => "ResultResettedToSubmissionFinished",
            ResultEvent::ResettedToAuditedTentatively => "ResultResettedToAuditedTentatively",
            ResultEvent::Finalized(_) => "ResultFinalized",
            ResultEvent::Resetted => "ResultResetted",
            ResultEvent::Published => "ResultPublished",
            ResultEvent::Unpublished => "ResultUnpublished",
            ResultEvent::BundleCreated(_) => "BallotBundleCreated",
            ResultEvent::BundleTallyEntered(_) => "BallotBundleTallyEntered",
            ResultEvent::BundleSubmitted(_) => "BallotBundleSubmitted",
            ResultEvent::BundleReviewSucceeded(_) => "BallotBundleReviewSucceeded",
            ResultEvent::BundleReviewRejected(_) => "BallotBundleReviewRejected",
            ResultEvent::BundleDeleted(_) => "BallotBundleDeleted",
        }
    }
}

// ============================================================================
// Individual Event Types
// ============================================================================

/// First event of every result stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionStarted {
    pub counting_circle_id: Uuid,
    pub political_business_id: Uuid,
    pub business_type: PoliticalBusinessType,
    pub contest_id: Uuid,
    pub domain_of_influence_id: Uuid,
    pub testing_phase: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsEntered {
    pub payload: ResultPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountOfVotersEntered {
    pub count_of_voters: CountOfVoters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChangedAt {
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedForCorrection {
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionFinished {
    pub at: DateTime<Utc>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleCreated {
    pub bundle_id: Uuid,
    pub number: u32,
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleTallyEntered {
    pub bundle_id: Uuid,
    pub tally: BundleTally,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleRef {
    pub bundle_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleReviewed {
    pub bundle_id: Uuid,
    pub reviewed_by: String,
}
