use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::events::*;
use super::value_objects::{LotDecision, LotDecisionContext, LotDecisions};
use crate::apportionment::errors::ApportionmentError;
use crate::event_sourcing::core::Aggregate;

#[derive(Debug, Clone)]
pub enum LotDecisionCommand {
    Record {
        subject_id: Uuid,
        decision: LotDecision,
        /// Decisions the current data leaves open
        pending: Vec<LotDecisionContext>,
        at: DateTime<Utc>,
    },
}

/// Lot decisions recorded for one union or standalone election
#[derive(Debug, Clone, PartialEq)]
pub struct LotDecisionLog {
    pub id: Uuid,
    pub version: i64,
    pub decisions: LotDecisions,
}

impl Aggregate for LotDecisionLog {
    type Event = LotDecisionEvent;
    type Command = LotDecisionCommand;
    type Error = ApportionmentError;

    fn initial(aggregate_id: Uuid) -> Self {
        Self {
            id: aggregate_id,
            version: 0,
            decisions: LotDecisions::new(),
        }
    }

    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            LotDecisionEvent::Recorded(e) => self.decisions.insert(LotDecision {
                context: e.context.clone(),
                choice: e.choice.clone(),
            }),
        }
        Ok(())
    }

    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LotDecisionCommand::Record {
                subject_id,
                decision,
                pending,
                at,
            } => {
                if self.decisions.contains(&decision.context) {
                    return Err(ApportionmentError::LotDecisionAlreadyRecorded);
                }
                if !pending.contains(&decision.context) {
                    return Err(ApportionmentError::LotDecisionNotPending);
                }
                decision.choice.validate(&decision.context)?;

                Ok(vec![LotDecisionEvent::Recorded(LotDecisionRecorded {
                    subject_id: *subject_id,
                    context: decision.context.clone(),
                    choice: decision.choice.clone(),
                    at: *at,
                })])
            }
        }
    }

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}
