use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event_sourcing::core::DomainEvent;

// ============================================================================
// End Result Events - finalization history of one political business
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EndResultEvent {
    Finalized(EndResultFinalized),
    FinalizationReverted(EndResultFinalizationReverted),
}

impl DomainEvent for EndResultEvent {
    fn event_type(&self) -> &'static str {
        match self {
            EndResultEvent::Finalized(_) => "EndResultFinalized",
            EndResultEvent::FinalizationReverted(_) => "EndResultFinalizationReverted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndResultFinalized {
    pub political_business_id: Uuid,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndResultFinalizationReverted {
    pub political_business_id: Uuid,
    pub at: DateTime<Utc>,
}
