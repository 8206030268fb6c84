use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::bundle::{BallotBundle, BundleAction, BundleState, BundleTally};
use super::commands::ResultCommand;
use super::errors::ResultError;
use super::events::*;
use super::payload::{ResultPayload, ResultSnapshot};
use super::value_objects::{CountOfVoters, ResultAction, ResultState};
use crate::domain::shared::PoliticalBusinessType;
use crate::event_sourcing::core::Aggregate;

// ============================================================================
// Counting-Circle Result Aggregate - Domain Logic
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultAggregate {
    // Identity
    pub id: Uuid,
    pub version: i64,

    // Assignment (recorded by SubmissionStarted)
    pub counting_circle_id: Option<Uuid>,
    pub political_business_id: Option<Uuid>,
    pub business_type: Option<PoliticalBusinessType>,
    pub contest_id: Option<Uuid>,
    pub domain_of_influence_id: Option<Uuid>,
    pub testing_phase: bool,

    // Current State (derived from events)
    pub state: ResultState,
    pub payload: Option<ResultPayload>,
    pub count_of_voters: Option<CountOfVoters>,
    pub published: bool,
    pub bundles: BTreeMap<Uuid, BallotBundle>,

    // Audit Trail
    pub submission_done_at: Option<DateTime<Utc>>,
    pub correction_done_at: Option<DateTime<Utc>>,
    pub audited_tentatively_at: Option<DateTime<Utc>>,
    pub plausibilised_at: Option<DateTime<Utc>>,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl ResultAggregate {
    /// Entered payload plus the tallies of reviewed bundles.
    /// `None` before the submission started.
    pub fn snapshot(&self) -> Result<Option<ResultSnapshot>, ResultError> {
        let Some(business_type) = self.business_type else {
            return Ok(None);
        };

        let mut payload = self
            .payload
            .clone()
            .unwrap_or_else(|| ResultPayload::empty(business_type));
        for bundle in self.bundles.values() {
            if bundle.state == BundleState::Reviewed {
                if let Some(tally) = &bundle.tally {
                    payload.add(&tally.votes)?;
                }
            }
        }

        Ok(Some(ResultSnapshot {
            payload,
            count_of_voters: self.count_of_voters.unwrap_or_default(),
        }))
    }

    fn ensure_allowed(&self, action: ResultAction) -> Result<(), ResultError> {
        match action.transition(self.state) {
            Some(_) => Ok(()),
            None => Err(ResultError::InvalidStateTransition {
                action,
                state: self.state,
            }),
        }
    }

    fn ensure_bundles_closed(&self) -> Result<(), ResultError> {
        let open = self.bundles.values().filter(|b| b.state.is_open()).count();
        if open > 0 {
            return Err(ResultError::BundlesNotReviewed(open));
        }
        Ok(())
    }

    fn ensure_payload_type(&self, payload: &ResultPayload) -> Result<(), ResultError> {
        match self.business_type {
            Some(expected) if expected != payload.business_type() => Err(ResultError::PayloadTypeMismatch {
                expected,
                got: payload.business_type(),
            }),
            _ => Ok(()),
        }
    }

    fn bundle(&self, bundle_id: Uuid, action: BundleAction) -> Result<&BallotBundle, ResultError> {
        let bundle = self
            .bundles
            .get(&bundle_id)
            .ok_or(ResultError::BundleNotFound(bundle_id))?;
        if action.transition(bundle.state).is_none() {
            return Err(ResultError::InvalidBundleTransition {
                bundle_id,
                action,
                state: bundle.state,
            });
        }
        Ok(bundle)
    }

    fn bundle_mut(&mut self, bundle_id: Uuid) -> Result<&mut BallotBundle, ResultError> {
        self.bundles
            .get_mut(&bundle_id)
            .ok_or(ResultError::BundleNotFound(bundle_id))
    }

    /// Leaving the done set withdraws a publication first
    fn leave_done_set(&self, transition: ResultEvent) -> Vec<ResultEvent> {
        let mut events = Vec::with_capacity(2);
        if self.published {
            events.push(ResultEvent::Unpublished);
        }
        events.push(transition);
        events
    }

    fn handle_bundle_command(&self, command: &ResultCommand) -> Result<Vec<ResultEvent>, ResultError> {
        if let Some(business_type @ PoliticalBusinessType::Vote) = self.business_type {
            return Err(ResultError::BundlesNotSupported(business_type));
        }

        let event = match command {
            ResultCommand::CreateBundle {
                bundle_id,
                number,
                created_by,
            } => {
                if self.bundles.contains_key(bundle_id) {
                    return Err(ResultError::BundleAlreadyExists(*bundle_id));
                }
                if self.bundles.values().any(|b| b.number == *number) {
                    return Err(ResultError::DuplicateBundleNumber(*number));
                }
                ResultEvent::BundleCreated(BundleCreated {
                    bundle_id: *bundle_id,
                    number: *number,
                    created_by: created_by.clone(),
                })
            }
            ResultCommand::EnterBundleTally { bundle_id, tally } => {
                self.bundle(*bundle_id, BundleAction::EnterTally)?;
                self.ensure_payload_type(&tally.votes)?;
                ResultEvent::BundleTallyEntered(BundleTallyEntered {
                    bundle_id: *bundle_id,
                    tally: tally.clone(),
                })
            }
            ResultCommand::SubmitBundle { bundle_id } => {
                self.bundle(*bundle_id, BundleAction::Submit)?;
                ResultEvent::BundleSubmitted(BundleRef { bundle_id: *bundle_id })
            }
            ResultCommand::SucceedBundleReview { bundle_id, reviewer }
            | ResultCommand::RejectBundleReview { bundle_id, reviewer } => {
                let succeeded = matches!(command, ResultCommand::SucceedBundleReview { .. });
                let action = if succeeded {
                    BundleAction::SucceedReview
                } else {
                    BundleAction::RejectReview
                };
                let bundle = self.bundle(*bundle_id, action)?;
                if bundle.created_by == *reviewer {
                    return Err(ResultError::ReviewerIsCreator);
                }
                let reviewed = BundleReviewed {
                    bundle_id: *bundle_id,
                    reviewed_by: reviewer.clone(),
                };
                if succeeded {
                    ResultEvent::BundleReviewSucceeded(reviewed)
                } else {
                    ResultEvent::BundleReviewRejected(reviewed)
                }
            }
            ResultCommand::DeleteBundle { bundle_id } => {
                self.bundle(*bundle_id, BundleAction::Delete)?;
                ResultEvent::BundleDeleted(BundleRef { bundle_id: *bundle_id })
            }
            other => {
                return Err(ResultError::InvalidStateTransition {
                    action: other.action(),
                    state: self.state,
                })
            }
        };
        Ok(vec![event])
    }
}

// ============================================================================
// Aggregate Trait Implementation
// ============================================================================

impl Aggregate for ResultAggregate {
    type Event = ResultEvent;
    type Command = ResultCommand;
    type Error = ResultError;

    fn initial(aggregate_id: Uuid) -> Self {
        Self {
            id: aggregate_id,
            version: 0,
            counting_circle_id: None,
            political_business_id: None,
            business_type: None,
            contest_id: None,
            domain_of_influence_id: None,
            testing_phase: false,
            state: ResultState::Initial,
            payload: None,
            count_of_voters: None,
            published: false,
            bundles: BTreeMap::new(),
            submission_done_at: None,
            correction_done_at: None,
            audited_tentatively_at: None,
            plausibilised_at: None,
            finalized_at: None,
        }
    }

    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            ResultEvent::SubmissionStarted(e) => {
                self.counting_circle_id = Some(e.counting_circle_id);
                self.political_business_id = Some(e.political_business_id);
                self.business_type = Some(e.business_type);
                self.contest_id = Some(e.contest_id);
                self.domain_of_influence_id = Some(e.domain_of_influence_id);
                self.testing_phase = e.testing_phase;
                self.state = ResultState::SubmissionOngoing;
            }
            ResultEvent::ResultsEntered(e) => {
                self.payload = Some(e.payload.clone());
            }
            ResultEvent::CountOfVotersEntered(e) => {
                self.count_of_voters = Some(e.count_of_voters);
            }
            ResultEvent::SubmissionFinished(e) => {
                self.state = ResultState::SubmissionDone;
                self.submission_done_at = Some(e.at);
            }
            ResultEvent::FlaggedForCorrection(_) => {
                self.state = ResultState::ReadyForCorrection;
            }
            ResultEvent::CorrectionFinished(e) => {
                self.state = ResultState::CorrectionDone;
                self.correction_done_at = Some(e.at);
            }
            ResultEvent::AuditedTentatively(e) => {
                self.state = ResultState::AuditedTentatively;
                self.audited_tentatively_at = Some(e.at);
            }
            ResultEvent::Plausibilised(e) => {
                self.state = ResultState::Plausibilised;
                self.plausibilised_at = Some(e.at);
            }
            ResultEvent::ResettedToSubmissionFinished => {
                self.state = ResultState::SubmissionDone;
                self.audited_tentatively_at = None;
                self.plausibilised_at = None;
            }
            ResultEvent::ResettedToAuditedTentatively => {
                self.state = ResultState::AuditedTentatively;
                self.plausibilised_at = None;
            }
            ResultEvent::Finalized(e) => {
                self.state = ResultState::Finalized;
                self.finalized_at = Some(e.at);
            }
            ResultEvent::Resetted => {
                self.state = ResultState::SubmissionOngoing;
                self.payload = None;
                self.count_of_voters = None;
                self.published = false;
                self.bundles.clear();
                self.submission_done_at = None;
                self.correction_done_at = None;
                self.audited_tentatively_at = None;
                self.plausibilised_at = None;
            }
            ResultEvent::Published => {
                self.published = true;
            }
            ResultEvent::Unpublished => {
                self.published = false;
            }
            ResultEvent::BundleCreated(e) => {
                self.bundles.insert(
                    e.bundle_id,
                    BallotBundle::new(e.bundle_id, e.number, e.created_by.clone()),
                );
            }
            ResultEvent::BundleTallyEntered(e) => {
                self.bundle_mut(e.bundle_id)?.tally = Some(e.tally.clone());
            }
            ResultEvent::BundleSubmitted(e) => {
                self.bundle_mut(e.bundle_id)?.state = BundleState::ReadyForReview;
            }
            ResultEvent::BundleReviewSucceeded(e) => {
                let bundle = self.bundle_mut(e.bundle_id)?;
                bundle.state = BundleState::Reviewed;
                bundle.reviewed_by = Some(e.reviewed_by.clone());
            }
            ResultEvent::BundleReviewRejected(e) => {
                let bundle = self.bundle_mut(e.bundle_id)?;
                bundle.state = BundleState::InCorrection;
                bundle.reviewed_by = Some(e.reviewed_by.clone());
            }
            ResultEvent::BundleDeleted(e) => {
                self.bundle_mut(e.bundle_id)?.state = BundleState::Deleted;
            }
        }
        Ok(())
    }

    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        if let ResultCommand::EnterResults { expected_state, .. } = command {
            if *expected_state != self.state {
                return Err(ResultError::ExpectedStateMismatch {
                    expected: *expected_state,
                    actual: self.state,
                });
            }
        }
        self.ensure_allowed(command.action())?;

        match command {
            ResultCommand::StartSubmission {
                counting_circle_id,
                political_business_id,
                business_type,
                contest_id,
                domain_of_influence_id,
                testing_phase,
            } => Ok(vec![ResultEvent::SubmissionStarted(SubmissionStarted {
                counting_circle_id: *counting_circle_id,
                political_business_id: *political_business_id,
                business_type: *business_type,
                contest_id: *contest_id,
                domain_of_influence_id: *domain_of_influence_id,
                testing_phase: *testing_phase,
            })]),

            ResultCommand::EnterResults { payload, .. } => {
                self.ensure_payload_type(payload)?;
                Ok(vec![ResultEvent::ResultsEntered(ResultsEntered {
                    payload: payload.clone(),
                })])
            }

            ResultCommand::EnterCountOfVoters { count_of_voters } => {
                if !count_of_voters.is_consistent() {
                    return Err(ResultError::InvalidCountOfVoters);
                }
                Ok(vec![ResultEvent::CountOfVotersEntered(CountOfVotersEntered {
                    count_of_voters: *count_of_voters,
                })])
            }

            ResultCommand::FinishSubmission { at } => {
                self.ensure_bundles_closed()?;
                Ok(vec![ResultEvent::SubmissionFinished(StateChangedAt { at: *at })])
            }

            ResultCommand::FlagForCorrection { comment } => {
                Ok(vec![ResultEvent::FlaggedForCorrection(FlaggedForCorrection {
                    comment: comment.clone(),
                })])
            }

            ResultCommand::FinishCorrection { at, comment } => {
                self.ensure_bundles_closed()?;
                Ok(vec![ResultEvent::CorrectionFinished(CorrectionFinished {
                    at: *at,
                    comment: comment.clone(),
                })])
            }

            ResultCommand::AuditTentatively {
                at,
                publish_automatically,
            } => {
                let mut events = vec![ResultEvent::AuditedTentatively(StateChangedAt { at: *at })];
                if *publish_automatically && !self.published {
                    events.push(ResultEvent::Published);
                }
                Ok(events)
            }

            ResultCommand::Plausibilise { at } => Ok(vec![ResultEvent::Plausibilised(StateChangedAt { at: *at })]),

            ResultCommand::ResetToSubmissionFinished => {
                Ok(self.leave_done_set(ResultEvent::ResettedToSubmissionFinished))
            }

            ResultCommand::ResetToAuditedTentatively => Ok(vec![ResultEvent::ResettedToAuditedTentatively]),

            ResultCommand::Finalize { at } => Ok(vec![ResultEvent::Finalized(StateChangedAt { at: *at })]),

            ResultCommand::Reset => Ok(self.leave_done_set(ResultEvent::Resetted)),

            ResultCommand::Publish { publish_automatically } => {
                if *publish_automatically {
                    return Err(ResultError::PublicationNotManual);
                }
                if self.published {
                    return Err(ResultError::AlreadyPublished);
                }
                Ok(vec![ResultEvent::Published])
            }

            ResultCommand::Unpublish { publish_automatically } => {
                if *publish_automatically {
                    return Err(ResultError::PublicationNotManual);
                }
                if !self.published {
                    return Err(ResultError::NotPublished);
                }
                Ok(vec![ResultEvent::Unpublished])
            }

            ResultCommand::CreateBundle { .. }
            | ResultCommand::EnterBundleTally { .. }
            | ResultCommand::SubmitBundle { .. }
            | ResultCommand::SucceedBundleReview { .. }
            | ResultCommand::RejectBundleReview { .. }
            | ResultCommand::DeleteBundle { .. } => self.handle_bundle_command(command),
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
    use crate::domain::result::payload::MajorityPayload;
    use crate::event_sourcing::core::{wrap_events, Actor};
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 27, 12, 0, 0).unwrap()
    }

    fn started() -> ResultEvent {
        ResultEvent::SubmissionStarted(SubmissionStarted {
            counting_circle_id: Uuid::from_u128(1),
            political_business_id: Uuid::from_u128(2),
            business_type: PoliticalBusinessType::MajorityElection,
            contest_id: Uuid::from_u128(3),
            domain_of_influence_id: Uuid::from_u128(4),
            testing_phase: false,
        })
    }

    fn events_to(state: ResultState) -> Vec<ResultEvent> {
        let stamp = StateChangedAt { at: at() };
        let done = vec![started(), ResultEvent::SubmissionFinished(stamp.clone())];
        let audited = {
            let mut e = done.clone();
            e.push(ResultEvent::AuditedTentatively(stamp.clone()));
            e
        };
        match state {
            ResultState::Initial => vec![],
            ResultState::SubmissionOngoing => vec![started()],
            ResultState::SubmissionDone => done,
            ResultState::ReadyForCorrection => {
                let mut e = done;
                e.push(ResultEvent::FlaggedForCorrection(FlaggedForCorrection { comment: None }));
                e
            }
            ResultState::CorrectionDone => {
                let mut e = events_to(ResultState::ReadyForCorrection);
                e.push(ResultEvent::CorrectionFinished(CorrectionFinished { at: at(), comment: None }));
                e
            }
            ResultState::AuditedTentatively => audited,
            ResultState::Plausibilised => {
                let mut e = audited;
                e.push(ResultEvent::Plausibilised(stamp));
                e
            }
            ResultState::Finalized => {
                let mut e = events_to(ResultState::Plausibilised);
                e.push(ResultEvent::Finalized(StateChangedAt { at: at() }));
                e
            }
        }
    }

    fn aggregate_from(events: &[ResultEvent]) -> ResultAggregate {
        let id = Uuid::from_u128(99);
        let envelopes = wrap_events(id, 0, events.to_vec(), Uuid::nil(), &Actor::system());
        ResultAggregate::load_from_events(id, &envelopes).unwrap()
    }

    fn aggregate_in(state: ResultState) -> ResultAggregate {
        aggregate_from(&events_to(state))
    }

    fn apply_all(aggregate: &mut ResultAggregate, events: &[ResultEvent]) {
        for event in events {
            aggregate.apply_event(event).unwrap();
        }
    }

    fn sample_command(action: ResultAction, state: ResultState) -> ResultCommand {
        match action {
            ResultAction::StartSubmission => ResultCommand::StartSubmission {
                counting_circle_id: Uuid::from_u128(1),
                political_business_id: Uuid::from_u128(2),
                business_type: PoliticalBusinessType::MajorityElection,
                contest_id: Uuid::from_u128(3),
                domain_of_influence_id: Uuid::from_u128(4),
                testing_phase: false,
            },
            ResultAction::EnterResults => ResultCommand::EnterResults {
                expected_state: state,
                payload: ResultPayload::Majority(MajorityPayload::default()),
            },
            ResultAction::EnterCountOfVoters => ResultCommand::EnterCountOfVoters {
                count_of_voters: CountOfVoters::default(),
            },
            ResultAction::Bundle => ResultCommand::CreateBundle {
                bundle_id: Uuid::from_u128(7),
                number: 1,
                created_by: "alice".into(),
            },
            other => ResultCommand::for_transition(other, at(), None, false).unwrap(),
        }
    }

    #[test]
    fn test_empty_stream_is_initial() {
        let aggregate = aggregate_from(&[]);
        assert_eq!(aggregate.state, ResultState::Initial);
        assert_eq!(aggregate.version, 0);
        assert!(aggregate.snapshot().unwrap().is_none());
    }

    #[test]
    fn test_full_state_action_grid() {
        for state in ResultState::ALL {
            let aggregate = aggregate_in(state);
            assert_eq!(aggregate.state, state);

            for action in ResultAction::ALL {
                let result = aggregate.handle_command(&sample_command(action, state));
                let allowed = action.allowed_from().contains(&state);
                match result {
                    Err(ResultError::InvalidStateTransition { action: a, state: s }) => {
                        assert!(!allowed, "{action} should be allowed in {state}");
                        assert_eq!((a, s), (action, state));
                    }
                    Ok(events) => {
                        assert!(allowed, "{action} should be rejected in {state}");
                        let mut next = aggregate.clone();
                        apply_all(&mut next, &events);
                        assert_eq!(Some(next.state), action.transition(state));
                    }
                    // allowed but refused by a finer rule (e.g. unpublish of an unpublished result)
                    Err(_) => assert!(allowed, "{action} in {state} failed with the wrong error"),
                }
            }
        }
    }

    #[test]
    fn test_correction_finished_from_submission_ongoing_is_rejected() {
        let aggregate = aggregate_in(ResultState::SubmissionOngoing);
        let result = aggregate.handle_command(&ResultCommand::FinishCorrection { at: at(), comment: None });

        assert!(matches!(
            result,
            Err(ResultError::InvalidStateTransition {
                action: ResultAction::CorrectionFinished,
                state: ResultState::SubmissionOngoing
            })
        ));
        assert_eq!(aggregate.submission_done_at, None);
        assert_eq!(aggregate.state, ResultState::SubmissionOngoing);
    }

    #[test]
    fn test_double_publish_is_rejected() {
        let mut aggregate = aggregate_in(ResultState::AuditedTentatively);
        let publish = ResultCommand::Publish {
            publish_automatically: false,
        };
        let events = aggregate.handle_command(&publish).unwrap();
        assert_eq!(events, vec![ResultEvent::Published]);
        apply_all(&mut aggregate, &events);

        let err = aggregate.handle_command(&publish).unwrap_err();
        assert_eq!(err.to_string(), "result is already published");
        assert!(aggregate.published);
    }

    #[test]
    fn test_automatic_publication() {
        let mut aggregate = aggregate_in(ResultState::SubmissionDone);
        let events = aggregate
            .handle_command(&ResultCommand::AuditTentatively {
                at: at(),
                publish_automatically: true,
            })
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], ResultEvent::Published);
        apply_all(&mut aggregate, &events);

        let manual = aggregate.handle_command(&ResultCommand::Publish {
            publish_automatically: true,
        });
        assert!(matches!(manual, Err(ResultError::PublicationNotManual)));
    }

    #[test]
    fn test_leaving_done_set_unpublishes() {
        let mut aggregate = aggregate_in(ResultState::Plausibilised);
        apply_all(&mut aggregate, &[ResultEvent::Published]);

        let events = aggregate.handle_command(&ResultCommand::ResetToSubmissionFinished).unwrap();
        assert_eq!(
            events,
            vec![ResultEvent::Unpublished, ResultEvent::ResettedToSubmissionFinished]
        );
        apply_all(&mut aggregate, &events);
        assert!(!aggregate.published);
        assert_eq!(aggregate.state, ResultState::SubmissionDone);
        assert_eq!(aggregate.plausibilised_at, None);
    }

    #[test]
    fn test_expected_state_mismatch() {
        let aggregate = aggregate_in(ResultState::ReadyForCorrection);
        let result = aggregate.handle_command(&ResultCommand::EnterResults {
            expected_state: ResultState::SubmissionOngoing,
            payload: ResultPayload::Majority(MajorityPayload::default()),
        });
        assert!(matches!(
            result,
            Err(ResultError::ExpectedStateMismatch {
                expected: ResultState::SubmissionOngoing,
                actual: ResultState::ReadyForCorrection
            })
        ));
    }

    #[test]
    fn test_wrong_payload_variant() {
        let aggregate = aggregate_in(ResultState::SubmissionOngoing);
        let result = aggregate.handle_command(&ResultCommand::EnterResults {
            expected_state: ResultState::SubmissionOngoing,
            payload: ResultPayload::empty(PoliticalBusinessType::Vote),
        });
        assert!(matches!(result, Err(ResultError::PayloadTypeMismatch { .. })));
    }

    #[test]
    fn test_bundles_gate_submission_and_feed_effective_payload() {
        let candidate = Uuid::new_v4();
        let bundle_id = Uuid::new_v4();
        let mut aggregate = aggregate_in(ResultState::SubmissionOngoing);

        let mut entered = MajorityPayload::default();
        entered.candidate_votes.insert(candidate, 10);
        let mut tally = MajorityPayload::default();
        tally.candidate_votes.insert(candidate, 4);
        tally.empty_votes = 1;

        let commands = [
            ResultCommand::EnterResults {
                expected_state: ResultState::SubmissionOngoing,
                payload: ResultPayload::Majority(entered),
            },
            ResultCommand::CreateBundle {
                bundle_id,
                number: 1,
                created_by: "alice".into(),
            },
            ResultCommand::EnterBundleTally {
                bundle_id,
                tally: BundleTally {
                    ballot_count: 5,
                    votes: ResultPayload::Majority(tally),
                },
            },
            ResultCommand::SubmitBundle { bundle_id },
        ];
        for command in &commands {
            let events = aggregate.handle_command(command).unwrap();
            apply_all(&mut aggregate, &events);
        }

        // open bundle blocks finishing, and the tally does not count yet
        assert!(matches!(
            aggregate.handle_command(&ResultCommand::FinishSubmission { at: at() }),
            Err(ResultError::BundlesNotReviewed(1))
        ));
        let ResultPayload::Majority(effective) = aggregate.snapshot().unwrap().unwrap().payload else {
            panic!("majority payload expected");
        };
        assert_eq!(effective.candidate_votes[&candidate], 10);

        let own_review = aggregate.handle_command(&ResultCommand::SucceedBundleReview {
            bundle_id,
            reviewer: "alice".into(),
        });
        assert!(matches!(own_review, Err(ResultError::ReviewerIsCreator)));

        let events = aggregate
            .handle_command(&ResultCommand::SucceedBundleReview {
                bundle_id,
                reviewer: "bob".into(),
            })
            .unwrap();
        apply_all(&mut aggregate, &events);

        let ResultPayload::Majority(effective) = aggregate.snapshot().unwrap().unwrap().payload else {
            panic!("majority payload expected");
        };
        assert_eq!(effective.candidate_votes[&candidate], 14);
        assert_eq!(effective.empty_votes, 1);
        assert!(aggregate
            .handle_command(&ResultCommand::FinishSubmission { at: at() })
            .is_ok());
    }

    #[test]
    fn test_duplicate_bundle_number() {
        let mut aggregate = aggregate_in(ResultState::SubmissionOngoing);
        apply_all(
            &mut aggregate,
            &[ResultEvent::BundleCreated(BundleCreated {
                bundle_id: Uuid::new_v4(),
                number: 3,
                created_by: "alice".into(),
            })],
        );
        let result = aggregate.handle_command(&ResultCommand::CreateBundle {
            bundle_id: Uuid::new_v4(),
            number: 3,
            created_by: "bob".into(),
        });
        assert!(matches!(result, Err(ResultError::DuplicateBundleNumber(3))));
    }

    #[test]
    fn test_reset_clears_entries() {
        let mut aggregate = aggregate_in(ResultState::AuditedTentatively);
        apply_all(
            &mut aggregate,
            &[ResultEvent::ResultsEntered(ResultsEntered {
                payload: ResultPayload::Majority(MajorityPayload::default()),
            })],
        );
        let events = aggregate.handle_command(&ResultCommand::Reset).unwrap();
        apply_all(&mut aggregate, &events);

        assert_eq!(aggregate.state, ResultState::SubmissionOngoing);
        assert_eq!(aggregate.payload, None);
        assert_eq!(aggregate.submission_done_at, None);
        assert_eq!(aggregate.audited_tentatively_at, None);
        assert_eq!(aggregate.political_business_id, Some(Uuid::from_u128(2)));
    }

    proptest! {
        #[test]
        fn prop_replay_reproduces_live_state(picks in prop::collection::vec(0usize..ResultAction::ALL.len(), 0..40)) {
            let id = Uuid::from_u128(99);
            let mut live = ResultAggregate::initial(id);
            let mut history = Vec::new();

            for pick in picks {
                let action = ResultAction::ALL[pick];
                let command = sample_command(action, live.state);
                if let Ok(events) = live.handle_command(&command) {
                    let envelopes = wrap_events(id, live.version, events, Uuid::nil(), &Actor::system());
                    for envelope in &envelopes {
                        live.apply_event(&envelope.event_data).unwrap();
                        live.set_version(envelope.sequence_number);
                    }
                    history.extend(envelopes);
                }
            }

            let replayed = ResultAggregate::load_from_events(id, &history).unwrap();
            prop_assert_eq!(&replayed, &live);
            prop_assert_eq!(ResultAggregate::load_from_events(id, &history).unwrap(), replayed);
        }
    }
}
