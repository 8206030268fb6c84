use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value_objects::{LotChoice, LotDecisionContext};
use crate::event_sourcing::core::DomainEvent;

// ============================================================================
// Lot Decision Events - one stream per apportionment subject
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LotDecisionEvent {
    Recorded(LotDecisionRecorded),
}

impl DomainEvent for LotDecisionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LotDecisionEvent::Recorded(_) => "LotDecisionRecorded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotDecisionRecorded {
    pub subject_id: Uuid,
    pub context: LotDecisionContext,
    pub choice: LotChoice,
    pub at: DateTime<Utc>,
}
