use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::errors::EndResultError;
use super::events::*;
use crate::event_sourcing::core::Aggregate;

// ============================================================================
// End Result Finalization Aggregate
// ============================================================================

#[derive(Debug, Clone)]
pub enum FinalizationCommand {
    Finalize {
        political_business_id: Uuid,
        at: DateTime<Utc>,
        count_of_done_counting_circles: u32,
        total_count_of_counting_circles: u32,
    },
    RevertFinalization {
        political_business_id: Uuid,
        at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EndResultFinalization {
    pub id: Uuid,
    pub version: i64,
    pub finalized: bool,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl Aggregate for EndResultFinalization {
    type Event = EndResultEvent;
    type Command = FinalizationCommand;
    type Error = EndResultError;

    fn initial(aggregate_id: Uuid) -> Self {
        Self {
            id: aggregate_id,
            version: 0,
            finalized: false,
            finalized_at: None,
        }
    }

    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            EndResultEvent::Finalized(e) => {
                self.finalized = true;
                self.finalized_at = Some(e.at);
            }
            EndResultEvent::FinalizationReverted(_) => {
                self.finalized = false;
                self.finalized_at = None;
            }
        }
        Ok(())
    }

    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            FinalizationCommand::Finalize {
                political_business_id,
                at,
                count_of_done_counting_circles,
                total_count_of_counting_circles,
            } => {
                if self.finalized {
                    return Err(EndResultError::AlreadyFinalized);
                }
                if count_of_done_counting_circles != total_count_of_counting_circles {
                    return Err(EndResultError::Incomplete {
                        done: *count_of_done_counting_circles,
                        total: *total_count_of_counting_circles,
                    });
                }
                Ok(vec![EndResultEvent::Finalized(EndResultFinalized {
                    political_business_id: *political_business_id,
                    at: *at,
                })])
            }
            FinalizationCommand::RevertFinalization {
                political_business_id,
                at,
            } => {
                if !self.finalized {
                    return Err(EndResultError::NotFinalized);
                }
                Ok(vec![EndResultEvent::FinalizationReverted(EndResultFinalizationReverted {
                    political_business_id: *political_business_id,
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

#[cfg(test)]
mod tests {
    use super::*;

    fn finalize(done: u32, total: u32) -> FinalizationCommand {
        FinalizationCommand::Finalize {
            political_business_id: Uuid::nil(),
            at: Utc::now(),
            count_of_done_counting_circles: done,
            total_count_of_counting_circles: total,
        }
    }

    #[test]
    fn test_finalize_requires_completeness() {
        let aggregate = EndResultFinalization::initial(Uuid::new_v4());
        assert!(matches!(
            aggregate.handle_command(&finalize(2, 3)),
            Err(EndResultError::Incomplete { done: 2, total: 3 })
        ));
        assert_eq!(aggregate.handle_command(&finalize(3, 3)).unwrap().len(), 1);
    }

    #[test]
    fn test_finalize_and_revert_alternate() {
        let mut aggregate = EndResultFinalization::initial(Uuid::new_v4());
        let revert = FinalizationCommand::RevertFinalization {
            political_business_id: Uuid::nil(),
            at: Utc::now(),
        };
        assert!(matches!(aggregate.handle_command(&revert), Err(EndResultError::NotFinalized)));

        for event in aggregate.handle_command(&finalize(1, 1)).unwrap() {
            aggregate.apply_event(&event).unwrap();
        }
        assert!(aggregate.finalized);
        assert!(matches!(
            aggregate.handle_command(&finalize(1, 1)),
            Err(EndResultError::AlreadyFinalized)
        ));

        for event in aggregate.handle_command(&revert).unwrap() {
            aggregate.apply_event(&event).unwrap();
        }
        assert!(!aggregate.finalized);
    }
}
