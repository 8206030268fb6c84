use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::aggregate::{EndResultFinalization, FinalizationCommand};
use super::errors::EndResultError;
use super::events::EndResultEvent;
use super::model::{Contribution, EndResult, EndResultView, ViewScope};
use super::store::EndResultStore;
use crate::domain::result::{ResultAggregate, ResultEvent, ResultSnapshot};
use crate::domain::shared::{
    action_hash, consume_approval, counting_circle_result_id, end_result_stream_id, verify_approval,
    PartialResultVisibility, PoliticalBusiness, PoliticalBusinessCatalog, SecondFactorError, SecondFactorVerifier,
};
use crate::event_sourcing::core::{wrap_events, Actor, Aggregate};
use crate::event_sourcing::store::EventStore;
use crate::metrics::Metrics;
use crate::utils::{retry_on_transient, IsTransient, RetryConfig, RetryResult};

// ============================================================================
// Hierarchical End-Result Aggregator
// ============================================================================
//
// Projects done counting-circle results into one end result per political
// business. Every change is a versioned read-modify-write against the
// store, redone with backoff when another writer got there first, so
// updates of one end result are serialized without a lock.
//
// Partial results for intermediate domains of influence are reduced on
// demand from the same contributions.
//
// ============================================================================

pub const FINALIZE_ACTION: &str = "FinalizeEndResult";
pub const REVERT_FINALIZATION_ACTION: &str = "RevertEndResultFinalization";

pub struct EndResultAggregator {
    store: Arc<dyn EndResultStore>,
    catalog: Arc<dyn PoliticalBusinessCatalog>,
    result_events: EventStore<ResultEvent>,
    finalization_events: EventStore<EndResultEvent>,
    verifier: Arc<dyn SecondFactorVerifier>,
    visibility: Arc<dyn PartialResultVisibility>,
    retry: RetryConfig,
    metrics: Arc<Metrics>,
}

impl EndResultAggregator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn EndResultStore>,
        catalog: Arc<dyn PoliticalBusinessCatalog>,
        result_events: EventStore<ResultEvent>,
        finalization_events: EventStore<EndResultEvent>,
        verifier: Arc<dyn SecondFactorVerifier>,
        visibility: Arc<dyn PartialResultVisibility>,
        retry: RetryConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            catalog,
            result_events,
            finalization_events,
            verifier,
            visibility,
            retry,
            metrics,
        }
    }

    fn business(&self, political_business_id: Uuid) -> Result<PoliticalBusiness, EndResultError> {
        self.catalog
            .political_business(political_business_id)
            .ok_or(EndResultError::UnknownPoliticalBusiness(political_business_id))
    }

    /// Domains of influence strictly between the circle and the business
    fn intermediate_path(&self, business: &PoliticalBusiness, counting_circle_id: Uuid) -> Result<Vec<Uuid>, EndResultError> {
        let circle = self
            .catalog
            .counting_circle(counting_circle_id)
            .ok_or(EndResultError::UnknownCountingCircle(counting_circle_id))?;
        Ok(self
            .catalog
            .domain_of_influence_path(circle.domain_of_influence_id)
            .into_iter()
            .map(|doi| doi.id)
            .take_while(|id| *id != business.domain_of_influence_id)
            .collect())
    }

    async fn current(&self, business: &PoliticalBusiness) -> Result<EndResult, EndResultError> {
        Ok(self
            .store
            .get(business.id)
            .await?
            .unwrap_or_else(|| EndResult::new(business)))
    }

    /// Versioned read-modify-write, redone on conflicts
    async fn update<F>(&self, business: &PoliticalBusiness, operation: &'static str, mutate: F) -> Result<EndResult, EndResultError>
    where
        F: Fn(&mut EndResult) -> Result<(), EndResultError> + Send + Sync,
    {
        let political_business_id = business.id;
        let outcome = retry_on_transient(&self.retry, |attempt| {
            let mutate = &mutate;
            async move {
                if attempt > 1 {
                    self.metrics.record_retry_attempt(operation, attempt);
                }
                let current = self.store.get(political_business_id).await?;
                let expected_version = current.as_ref().map_or(0, |e| e.version);
                let mut end_result = current.unwrap_or_else(|| EndResult::new(business));
                mutate(&mut end_result)?;
                end_result.version = self.store.put(end_result.clone(), expected_version).await?;
                Ok::<_, EndResultError>(end_result)
            }
        })
        .await;

        match outcome {
            RetryResult::Success(end_result) => {
                tracing::debug!(
                    political_business_id = %political_business_id,
                    operation = operation,
                    version = end_result.version,
                    done = end_result.count_of_done_counting_circles(),
                    total = end_result.total_count_of_counting_circles,
                    "End result updated"
                );
                Ok(end_result)
            }
            RetryResult::Failed(error) | RetryResult::PermanentFailure(error) => {
                if error.is_transient() {
                    self.metrics.record_conflict(operation);
                    self.metrics.record_retry_outcome(operation, false);
                }
                Err(error)
            }
        }
    }

    fn contribution(
        &self,
        business: &PoliticalBusiness,
        counting_circle_id: Uuid,
        snapshot: ResultSnapshot,
    ) -> Result<Contribution, EndResultError> {
        Ok(Contribution {
            counting_circle_id,
            intermediate_domains_of_influence: self.intermediate_path(business, counting_circle_id)?,
            snapshot,
        })
    }

    /// What the circle's result stream contributes, `None` while it is not done
    async fn done_contribution(&self, business: &PoliticalBusiness, counting_circle_id: Uuid) -> Result<Option<Contribution>, EndResultError> {
        let result_id = counting_circle_result_id(business.id, counting_circle_id);
        let result: ResultAggregate = self.result_events.load_aggregate(result_id).await?;
        if !result.state.is_done() {
            return Ok(None);
        }
        let snapshot = result.snapshot().map_err(|e| EndResultError::Snapshot {
            result_id,
            message: e.to_string(),
        })?;
        snapshot
            .map(|snapshot| self.contribution(business, counting_circle_id, snapshot))
            .transpose()
    }

    /// A counting circle entered the done set (or its done snapshot changed)
    pub async fn add_contribution(
        &self,
        political_business_id: Uuid,
        counting_circle_id: Uuid,
        snapshot: ResultSnapshot,
    ) -> Result<EndResult, EndResultError> {
        let business = self.business(political_business_id)?;
        let contribution = self.contribution(&business, counting_circle_id, snapshot)?;

        self.update(&business, "end_result_add", |end_result| {
            end_result.upsert_contribution(contribution.clone(), &business)
        })
        .await
    }

    /// A counting circle is about to leave the done set. Refused while the
    /// end result is finalized; runs before the result events are appended.
    pub async fn withdraw_contribution(
        &self,
        political_business_id: Uuid,
        counting_circle_id: Uuid,
    ) -> Result<EndResult, EndResultError> {
        let business = self.business(political_business_id)?;
        self.update(&business, "end_result_withdraw", |end_result| {
            if end_result.finalized {
                return Err(EndResultError::Finalized(political_business_id));
            }
            end_result.remove_contribution(counting_circle_id, &business)?;
            Ok(())
        })
        .await
    }

    /// Puts one circle back in line with its result stream
    pub async fn reconcile_contribution(
        &self,
        political_business_id: Uuid,
        counting_circle_id: Uuid,
    ) -> Result<EndResult, EndResultError> {
        let business = self.business(political_business_id)?;
        let contribution = self.done_contribution(&business, counting_circle_id).await?;

        self.update(&business, "end_result_reconcile", |end_result| match &contribution {
            Some(contribution) => end_result.upsert_contribution(contribution.clone(), &business),
            None => end_result.remove_contribution(counting_circle_id, &business).map(|_| ()),
        })
        .await
    }

    /// Puts the finalized flag back in line with the finalization stream
    async fn reconcile_finalization(&self, business: &PoliticalBusiness) -> Result<EndResult, EndResultError> {
        let finalization: EndResultFinalization = self
            .finalization_events
            .load_aggregate(end_result_stream_id(business.id))
            .await?;
        self.update(business, "end_result_reconcile", |end_result| {
            end_result.finalized = finalization.finalized;
            Ok(())
        })
        .await
    }

    pub async fn end_result(&self, political_business_id: Uuid) -> Result<EndResult, EndResultError> {
        let business = self.business(political_business_id)?;
        self.current(&business).await
    }

    pub async fn get_end_result(&self, political_business_id: Uuid, scope: ViewScope) -> Result<EndResultView, EndResultError> {
        let business = self.business(political_business_id)?;
        let end_result = self.current(&business).await?;

        match scope {
            ViewScope::Full => {
                if !end_result.is_complete() {
                    return Err(EndResultError::Incomplete {
                        done: end_result.count_of_done_counting_circles(),
                        total: end_result.total_count_of_counting_circles,
                    });
                }
                Ok(EndResultView {
                    political_business_id,
                    domain_of_influence_id: business.domain_of_influence_id,
                    partial: false,
                    count_of_done_counting_circles: end_result.count_of_done_counting_circles(),
                    total_count_of_counting_circles: end_result.total_count_of_counting_circles,
                    finalized: end_result.finalized,
                    totals: end_result.totals,
                })
            }
            ViewScope::Partial { domain_of_influence_id } => {
                if !self.visibility.may_view_partial(domain_of_influence_id) {
                    return Err(EndResultError::PartialViewNotPermitted(domain_of_influence_id));
                }

                let mut total = 0u32;
                for counting_circle_id in &business.counting_circle_ids {
                    if self
                        .intermediate_path(&business, *counting_circle_id)?
                        .contains(&domain_of_influence_id)
                    {
                        total += 1;
                    }
                }
                if total == 0 {
                    return Err(EndResultError::NotIntermediateDomainOfInfluence {
                        political_business_id,
                        domain_of_influence_id,
                    });
                }

                let done = end_result
                    .contributions
                    .values()
                    .filter(|c| c.intermediate_domains_of_influence.contains(&domain_of_influence_id))
                    .count() as u32;
                Ok(EndResultView {
                    political_business_id,
                    domain_of_influence_id,
                    partial: true,
                    count_of_done_counting_circles: done,
                    total_count_of_counting_circles: total,
                    finalized: end_result.finalized,
                    totals: end_result.partial_totals(domain_of_influence_id, &business)?,
                })
            }
        }
    }

    /// Action id a second-factor transaction must be bound to
    pub async fn finalization_action_id(&self, political_business_id: Uuid, finalize: bool) -> Result<String, EndResultError> {
        let business = self.business(political_business_id)?;
        let end_result = self.current(&business).await?;
        let action = if finalize { FINALIZE_ACTION } else { REVERT_FINALIZATION_ACTION };
        Ok(action_hash(action, political_business_id, &end_result.totals)?)
    }

    pub async fn finalize(
        &self,
        political_business_id: Uuid,
        second_factor: Option<&str>,
        actor: &Actor,
    ) -> Result<Vec<EndResultEvent>, EndResultError> {
        self.change_finalization(political_business_id, true, second_factor, actor).await
    }

    pub async fn revert_finalization(
        &self,
        political_business_id: Uuid,
        second_factor: Option<&str>,
        actor: &Actor,
    ) -> Result<Vec<EndResultEvent>, EndResultError> {
        self.change_finalization(political_business_id, false, second_factor, actor).await
    }

    /// The flag is set on the working state first, under the same versioned
    /// update that withdrawals go through, and the event is appended after.
    async fn change_finalization(
        &self,
        political_business_id: Uuid,
        finalize: bool,
        second_factor: Option<&str>,
        actor: &Actor,
    ) -> Result<Vec<EndResultEvent>, EndResultError> {
        let business = self.business(political_business_id)?;
        let policy = self
            .catalog
            .contest_policy(business.contest_id)
            .ok_or(EndResultError::UnknownContest(business.contest_id))?;
        if policy.locked {
            return Err(EndResultError::ContestLocked(business.contest_id));
        }
        if policy.end_result_finalize_disabled {
            return Err(EndResultError::FinalizationDisabled);
        }

        let end_result = self.current(&business).await?;
        let stream_id = end_result_stream_id(political_business_id);
        let finalization: EndResultFinalization = self.finalization_events.load_aggregate(stream_id).await?;

        let now = Utc::now();
        let (command, action) = if finalize {
            (
                FinalizationCommand::Finalize {
                    political_business_id,
                    at: now,
                    count_of_done_counting_circles: end_result.count_of_done_counting_circles(),
                    total_count_of_counting_circles: end_result.total_count_of_counting_circles,
                },
                FINALIZE_ACTION,
            )
        } else {
            (
                FinalizationCommand::RevertFinalization {
                    political_business_id,
                    at: now,
                },
                REVERT_FINALIZATION_ACTION,
            )
        };
        let events = finalization.handle_command(&command)?;

        // the approval covers the totals it was computed from
        let approval = if policy.second_factor_required {
            let expected = action_hash(action, political_business_id, &end_result.totals)?;
            let transaction_id = verify_approval(self.verifier.as_ref(), second_factor, action, &expected, now).await?;
            Some((transaction_id, end_result.totals.clone()))
        } else {
            None
        };

        self.update(&business, "end_result_finalization", |current| {
            if let Some((transaction_id, approved_totals)) = &approval {
                if current.totals != *approved_totals {
                    return Err(SecondFactorError::DataChanged(transaction_id.to_string()).into());
                }
            }
            match (finalize, current.finalized) {
                (true, true) => return Err(EndResultError::AlreadyFinalized),
                (false, false) => return Err(EndResultError::NotFinalized),
                (true, false) if !current.is_complete() => {
                    return Err(EndResultError::Incomplete {
                        done: current.count_of_done_counting_circles(),
                        total: current.total_count_of_counting_circles,
                    })
                }
                _ => {}
            }
            current.finalized = finalize;
            Ok(())
        })
        .await?;

        let envelopes = wrap_events(stream_id, finalization.version(), events.clone(), Uuid::new_v4(), actor);
        if let Err(error) = self
            .finalization_events
            .append_events(stream_id, finalization.version(), &envelopes)
            .await
        {
            if let Err(reconcile_error) = self.reconcile_finalization(&business).await {
                tracing::warn!(
                    political_business_id = %political_business_id,
                    error = %reconcile_error,
                    "End result finalization flag could not be restored"
                );
                self.metrics.record_projection_failure("end_result_finalization");
            }
            return Err(error.into());
        }
        if let Some((transaction_id, _)) = approval {
            consume_approval(self.verifier.as_ref(), transaction_id).await;
        }
        self.metrics.record_events_appended("end_result", envelopes.len());

        tracing::info!(
            political_business_id = %political_business_id,
            finalized = finalize,
            user_id = %actor.user_id,
            "End result finalization changed"
        );
        Ok(events)
    }

    /// Rebuilds the working state from the result streams and the
    /// finalization stream of the business
    pub async fn rebuild(&self, political_business_id: Uuid) -> Result<EndResult, EndResultError> {
        let business = self.business(political_business_id)?;
        let mut rebuilt = EndResult::new(&business);

        for counting_circle_id in &business.counting_circle_ids {
            if let Some(contribution) = self.done_contribution(&business, *counting_circle_id).await? {
                rebuilt.contributions.insert(*counting_circle_id, contribution);
            }
        }

        let finalization: EndResultFinalization = self
            .finalization_events
            .load_aggregate(end_result_stream_id(political_business_id))
            .await?;
        rebuilt.finalized = finalization.finalized;
        rebuilt.recompute(&business)?;

        tracing::info!(
            political_business_id = %political_business_id,
            contributions = rebuilt.contributions.len(),
            "Rebuilding end result from event log"
        );

        self.update(&business, "end_result_rebuild", |end_result| {
            let version = end_result.version;
            *end_result = rebuilt.clone();
            end_result.version = version;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::result::{ResultAction, ResultState};
    use crate::error::{ErrorKind, TallyError};
    use crate::service::TallyService;
    use crate::test_support::*;

    async fn complete_vote(h: &Harness) {
        let c = &h.contest;
        for (circle, (yes, no)) in c.circles.iter().zip([(60, 40), (10, 30), (25, 25)]) {
            h.complete_circle(c.vote_id, *circle, c.vote_payload(yes, no), yes + no).await;
        }
    }

    #[tokio::test]
    async fn test_full_view_waits_for_every_circle() {
        let h = Harness::new();
        let c = &h.contest;
        h.complete_circle(c.vote_id, c.circles[0], c.vote_payload(60, 40), 100).await;
        h.complete_circle(c.vote_id, c.circles[1], c.vote_payload(10, 30), 40).await;

        let error = h.service.get_end_result(c.vote_id, ViewScope::Full).await.unwrap_err();
        assert!(matches!(error, TallyError::EndResult(EndResultError::Incomplete { done: 2, total: 3 })));

        h.complete_circle(c.vote_id, c.circles[2], c.vote_payload(25, 25), 50).await;
        let view = h.service.get_end_result(c.vote_id, ViewScope::Full).await.unwrap();
        let q = question(&view);

        assert!(!view.partial);
        assert_eq!(view.count_of_done_counting_circles, 3);
        assert_eq!((q.yes, q.no), (95, 95));
        assert!(!q.accepted);
        assert_eq!(q.counting_circles_accepted, 1);
        assert_eq!(q.counting_circles_rejected, 2);
    }

    #[tokio::test]
    async fn test_partial_views_need_permission_and_an_intermediate_domain() {
        let h = Harness::new();
        let c = &h.contest;
        h.complete_circle(c.vote_id, c.circles[2], c.vote_payload(25, 25), 50).await;

        let error = h
            .service
            .get_end_result(
                c.vote_id,
                ViewScope::Partial {
                    domain_of_influence_id: c.districts[1],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(error, TallyError::EndResult(EndResultError::PartialViewNotPermitted(_))));
        assert_eq!(error.kind(), ErrorKind::Authorization);

        // district A lies above no circle of the district B election
        let error = h
            .service
            .get_end_result(
                c.elections[1],
                ViewScope::Partial {
                    domain_of_influence_id: c.districts[0],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            TallyError::EndResult(EndResultError::NotIntermediateDomainOfInfluence { .. })
        ));

        let view = h
            .service
            .get_end_result(
                c.vote_id,
                ViewScope::Partial {
                    domain_of_influence_id: c.districts[0],
                },
            )
            .await
            .unwrap();
        assert!(view.partial);
        assert_eq!(view.count_of_done_counting_circles, 0);
        assert_eq!(question(&view).yes, 0);
    }

    #[tokio::test]
    async fn test_finalize_needs_a_complete_end_result() {
        let h = Harness::new();
        let c = &h.contest;
        h.complete_circle(c.vote_id, c.circles[0], c.vote_payload(60, 40), 100).await;

        let error = h.service.finalize_end_result(c.vote_id, None, &monitor()).await.unwrap_err();
        assert!(matches!(error, TallyError::EndResult(EndResultError::Incomplete { done: 1, total: 3 })));

        let error = h
            .service
            .revert_end_result_finalization(c.vote_id, None, &monitor())
            .await
            .unwrap_err();
        assert!(matches!(error, TallyError::EndResult(EndResultError::NotFinalized)));
    }

    #[tokio::test]
    async fn test_finalize_and_revert() {
        let h = Harness::new();
        let c = &h.contest;
        complete_vote(&h).await;

        let events = h.service.finalize_end_result(c.vote_id, None, &monitor()).await.unwrap();
        assert!(matches!(events.as_slice(), [EndResultEvent::Finalized(_)]));
        assert!(h.service.get_end_result(c.vote_id, ViewScope::Full).await.unwrap().finalized);

        let error = h.service.finalize_end_result(c.vote_id, None, &monitor()).await.unwrap_err();
        assert!(matches!(error, TallyError::EndResult(EndResultError::AlreadyFinalized)));
        assert_eq!(error.kind(), ErrorKind::StateConflict);

        h.service
            .revert_end_result_finalization(c.vote_id, None, &monitor())
            .await
            .unwrap();
        assert!(!h.service.get_end_result(c.vote_id, ViewScope::Full).await.unwrap().finalized);
    }

    #[tokio::test]
    async fn test_finalization_can_be_disabled() {
        let h = Harness::with_policy(|p| p.end_result_finalize_disabled = true);
        let c = &h.contest;
        complete_vote(&h).await;

        let error = h.service.finalize_end_result(c.vote_id, None, &monitor()).await.unwrap_err();
        assert!(matches!(error, TallyError::EndResult(EndResultError::FinalizationDisabled)));
    }

    #[tokio::test]
    async fn test_locked_contest_rejects_finalization() {
        let h = Harness::with_policy(|p| p.locked = true);
        let c = &h.contest;

        let error = h.service.finalize_end_result(c.vote_id, None, &monitor()).await.unwrap_err();
        assert!(matches!(error, TallyError::EndResult(EndResultError::ContestLocked(id)) if id == c.contest_id));
        assert_eq!(error.kind(), ErrorKind::Authorization);
    }

    #[tokio::test]
    async fn test_finalize_with_second_factor() {
        let h = Harness::with_policy(|p| p.second_factor_required = true);
        let c = &h.contest;
        for (circle, (yes, no)) in c.circles.iter().zip([(60, 40), (10, 30), (25, 25)]) {
            let result_id = TallyService::result_id(c.vote_id, *circle);
            h.service.start_submission(c.vote_id, *circle, &actor()).await.unwrap();
            h.service
                .submit(result_id, c.vote_payload(yes, no), ResultState::SubmissionOngoing, &actor())
                .await
                .unwrap();
            let action = ResultAction::SubmissionFinished;
            let token = h.approve(h.service.second_factor_action_id(result_id, action).await.unwrap()).await;
            h.service
                .transition_state(result_id, action, Some(&token), None, &actor())
                .await
                .unwrap();
            h.service
                .transition_state(result_id, ResultAction::AuditedTentatively, None, None, &monitor())
                .await
                .unwrap();
        }

        let error = h.service.finalize_end_result(c.vote_id, None, &monitor()).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Authorization);

        let token = h.approve(h.service.finalization_action_id(c.vote_id, true).await.unwrap()).await;
        h.event_log.fail_next_append();
        let error = h
            .service
            .finalize_end_result(c.vote_id, Some(&token), &monitor())
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Infrastructure);

        // nothing was appended, so the approval still counts
        h.service
            .finalize_end_result(c.vote_id, Some(&token), &monitor())
            .await
            .unwrap();

        // a token is good for one action only
        let error = h
            .service
            .revert_end_result_finalization(c.vote_id, Some(&token), &monitor())
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Authorization);
    }

    #[tokio::test]
    async fn test_rebuild_reproduces_the_projection() {
        let h = Harness::new();
        let c = &h.contest;
        complete_vote(&h).await;
        h.service.finalize_end_result(c.vote_id, None, &monitor()).await.unwrap();

        let projected = h.service.get_end_result(c.vote_id, ViewScope::Full).await.unwrap();
        let rebuilt = h.service.rebuild_end_result(c.vote_id).await.unwrap();
        assert_eq!(rebuilt, projected);
    }

    #[tokio::test]
    async fn test_concurrent_contributions_are_all_kept() {
        let h = Harness::new();
        let c = &h.contest;
        tokio::join!(
            h.complete_circle(c.vote_id, c.circles[0], c.vote_payload(60, 40), 100),
            h.complete_circle(c.vote_id, c.circles[1], c.vote_payload(10, 30), 40),
            h.complete_circle(c.vote_id, c.circles[2], c.vote_payload(25, 25), 50),
        );

        let view = h.service.get_end_result(c.vote_id, ViewScope::Full).await.unwrap();
        assert_eq!(question(&view).yes, 95);
    }

    #[tokio::test]
    async fn test_failed_finalization_append_restores_the_flag() {
        let h = Harness::new();
        let c = &h.contest;
        complete_vote(&h).await;

        h.event_log.fail_next_append();
        let error = h.service.finalize_end_result(c.vote_id, None, &monitor()).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Infrastructure);
        assert!(!h.service.get_end_result(c.vote_id, ViewScope::Full).await.unwrap().finalized);

        h.service.finalize_end_result(c.vote_id, None, &monitor()).await.unwrap();
        assert!(h.service.get_end_result(c.vote_id, ViewScope::Full).await.unwrap().finalized);
    }

    #[tokio::test]
    async fn test_finalize_racing_a_reset_never_finalizes_an_incomplete_result() {
        for _ in 0..10 {
            let h = Harness::new();
            let c = &h.contest;
            let mut result_ids = Vec::new();
            for (circle, (yes, no)) in c.circles.iter().zip([(60, 40), (10, 30), (25, 25)]) {
                result_ids.push(h.complete_circle(c.vote_id, *circle, c.vote_payload(yes, no), yes + no).await);
            }

            let finalize_monitor = monitor();
            let reset_monitor = monitor();
            let (finalized, reset) = tokio::join!(
                h.service.finalize_end_result(c.vote_id, None, &finalize_monitor),
                h.service
                    .transition_state(result_ids[0], ResultAction::Reset, None, None, &reset_monitor),
            );
            assert!(finalized.is_ok() != reset.is_ok());

            let view = h
                .service
                .get_end_result(
                    c.vote_id,
                    ViewScope::Partial {
                        domain_of_influence_id: c.districts[0],
                    },
                )
                .await
                .unwrap();
            let state = h.service.result(result_ids[0]).await.unwrap().state;
            if finalized.is_ok() {
                assert!(view.finalized);
                assert_eq!(view.count_of_done_counting_circles, 2);
                assert_eq!(state, ResultState::AuditedTentatively);
            } else {
                assert!(!view.finalized);
                assert_eq!(view.count_of_done_counting_circles, 1);
                assert!(!state.is_done());
            }
        }
    }
}
