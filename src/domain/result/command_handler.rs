use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::aggregate::ResultAggregate;
use super::commands::ResultCommand;
use super::errors::ResultError;
use super::events::ResultEvent;
use super::payload::{validate_payload, ResultPayload};
use super::value_objects::{CountOfVoters, ResultAction, ResultState};
use crate::domain::end_result::{EndResultAggregator, EndResultError};
use crate::domain::shared::{
    action_hash, consume_approval, counting_circle_result_id, verify_approval, ContestPolicy, PoliticalBusiness,
    PoliticalBusinessCatalog, SecondFactorVerifier,
};
use crate::event_sourcing::core::{wrap_events, Actor, Aggregate};
use crate::event_sourcing::store::{EventLogError, EventStore};
use crate::metrics::Metrics;

// ============================================================================
// Result Command Handler
// ============================================================================
//
// Orchestrates: Command → Aggregate → Events → Event Store → End Result
//
// Load the stream, check contest policy and entered data against the
// catalog, let the aggregate decide, verify the second factor, take the
// circle out of its end result if it leaves the done set, append under the
// loaded version, then add the circle if it entered the done set.
// A stale version surfaces as a concurrency conflict; user commands are
// never silently re-decided.
//
// ============================================================================

struct BusinessContext {
    business: PoliticalBusiness,
    policy: ContestPolicy,
}

pub struct ResultCommandHandler {
    event_store: EventStore<ResultEvent>,
    catalog: Arc<dyn PoliticalBusinessCatalog>,
    verifier: Arc<dyn SecondFactorVerifier>,
    end_results: Arc<EndResultAggregator>,
    metrics: Arc<Metrics>,
}

impl ResultCommandHandler {
    pub fn new(
        event_store: EventStore<ResultEvent>,
        catalog: Arc<dyn PoliticalBusinessCatalog>,
        verifier: Arc<dyn SecondFactorVerifier>,
        end_results: Arc<EndResultAggregator>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            event_store,
            catalog,
            verifier,
            end_results,
            metrics,
        }
    }

    pub async fn load(&self, result_id: Uuid) -> Result<ResultAggregate, ResultError> {
        Ok(self.event_store.load_aggregate::<ResultAggregate>(result_id).await?)
    }

    fn context(&self, political_business_id: Uuid) -> Result<BusinessContext, ResultError> {
        let business = self
            .catalog
            .political_business(political_business_id)
            .ok_or(ResultError::UnknownPoliticalBusiness(political_business_id))?;
        let policy = self
            .catalog
            .contest_policy(business.contest_id)
            .ok_or(ResultError::UnknownContest(business.contest_id))?;
        if policy.locked {
            return Err(ResultError::ContestLocked(business.contest_id));
        }
        Ok(BusinessContext { business, policy })
    }

    fn context_of(&self, aggregate: &ResultAggregate) -> Result<Option<BusinessContext>, ResultError> {
        aggregate
            .political_business_id
            .map(|id| self.context(id))
            .transpose()
    }

    fn publishes_automatically(&self, context: &BusinessContext) -> bool {
        let domain_of_influence_id = context.business.domain_of_influence_id;
        self.catalog
            .domain_of_influence(domain_of_influence_id)
            .is_some_and(|doi| {
                let level = self.catalog.domain_of_influence_level(domain_of_influence_id);
                context.policy.publishes_automatically(doi.doi_type, level)
            })
    }

    fn validate_entries(command: &ResultCommand, business: &PoliticalBusiness) -> Result<(), ResultError> {
        match command {
            ResultCommand::EnterResults { payload, .. } => validate_payload(payload, business),
            ResultCommand::EnterBundleTally { tally, .. } => validate_payload(&tally.votes, business),
            _ => Ok(()),
        }
    }

    fn action_id(aggregate: &ResultAggregate, action: ResultAction) -> Result<String, ResultError> {
        Ok(action_hash(&action.to_string(), aggregate.id, &aggregate.snapshot()?)?)
    }

    /// Action id a second-factor transaction for `action` must be bound to.
    /// Any change to the effective data afterwards invalidates it.
    pub async fn second_factor_action_id(&self, result_id: Uuid, action: ResultAction) -> Result<String, ResultError> {
        let aggregate = self.load(result_id).await?;
        Self::action_id(&aggregate, action)
    }

    pub async fn start_submission(
        &self,
        political_business_id: Uuid,
        counting_circle_id: Uuid,
        actor: &Actor,
    ) -> Result<Vec<ResultEvent>, ResultError> {
        let context = self.context(political_business_id)?;
        if self.catalog.counting_circle(counting_circle_id).is_none() {
            return Err(ResultError::UnknownCountingCircle(counting_circle_id));
        }
        if !context.business.counting_circle_ids.contains(&counting_circle_id) {
            return Err(ResultError::CountingCircleNotAssigned {
                political_business_id,
                counting_circle_id,
            });
        }

        let result_id = counting_circle_result_id(political_business_id, counting_circle_id);
        let aggregate = self.load(result_id).await?;
        let command = ResultCommand::StartSubmission {
            counting_circle_id,
            political_business_id,
            business_type: context.business.business_type(),
            contest_id: context.business.contest_id,
            domain_of_influence_id: context.business.domain_of_influence_id,
            testing_phase: context.policy.testing_phase,
        };
        self.execute(aggregate, command, None, actor).await
    }

    pub async fn enter_results(
        &self,
        result_id: Uuid,
        expected_state: ResultState,
        payload: ResultPayload,
        actor: &Actor,
    ) -> Result<Vec<ResultEvent>, ResultError> {
        let aggregate = self.load(result_id).await?;
        let command = ResultCommand::EnterResults {
            expected_state,
            payload,
        };
        self.execute(aggregate, command, None, actor).await
    }

    pub async fn enter_count_of_voters(
        &self,
        result_id: Uuid,
        count_of_voters: CountOfVoters,
        actor: &Actor,
    ) -> Result<Vec<ResultEvent>, ResultError> {
        let aggregate = self.load(result_id).await?;
        self.execute(aggregate, ResultCommand::EnterCountOfVoters { count_of_voters }, None, actor)
            .await
    }

    /// Payload-free lifecycle actions (finish, correct, audit, publish, reset, ...)
    pub async fn transition(
        &self,
        result_id: Uuid,
        action: ResultAction,
        second_factor: Option<&str>,
        comment: Option<String>,
        actor: &Actor,
    ) -> Result<Vec<ResultEvent>, ResultError> {
        let aggregate = self.load(result_id).await?;
        let publish_automatically = match self.context_of(&aggregate)? {
            Some(context) => self.publishes_automatically(&context),
            None => false,
        };
        let command = ResultCommand::for_transition(action, Utc::now(), comment, publish_automatically)
            .ok_or(ResultError::NotATransition(action))?;
        self.execute(aggregate, command, second_factor, actor).await
    }

    /// Ballot bundle operations
    pub async fn bundle(&self, result_id: Uuid, command: ResultCommand, actor: &Actor) -> Result<Vec<ResultEvent>, ResultError> {
        if command.action() != ResultAction::Bundle {
            return Err(ResultError::NotATransition(command.action()));
        }
        let aggregate = self.load(result_id).await?;
        self.execute(aggregate, command, None, actor).await
    }

    async fn execute(
        &self,
        aggregate: ResultAggregate,
        command: ResultCommand,
        second_factor: Option<&str>,
        actor: &Actor,
    ) -> Result<Vec<ResultEvent>, ResultError> {
        let action = command.action();
        let context = match &command {
            ResultCommand::StartSubmission {
                political_business_id, ..
            } => Some(self.context(*political_business_id)?),
            _ => self.context_of(&aggregate)?,
        };
        if let Some(context) = &context {
            Self::validate_entries(&command, &context.business)?;
        }

        let events = aggregate.handle_command(&command).inspect_err(|e| {
            tracing::warn!(result_id = %aggregate.id, action = %action, state = ?aggregate.state, error = %e, "Command rejected");
        })?;
        if events.is_empty() {
            return Ok(events);
        }

        let mut next = aggregate.clone();
        for event in &events {
            next.apply_event(event)?;
        }

        let second_factor_required = context.as_ref().is_some_and(|c| c.policy.second_factor_required);
        let approval = if action.requires_second_factor() && second_factor_required {
            let expected = Self::action_id(&aggregate, action)?;
            Some(
                verify_approval(
                    self.verifier.as_ref(),
                    second_factor,
                    &action.to_string(),
                    &expected,
                    Utc::now(),
                )
                .await?,
            )
        } else {
            None
        };

        let withdrawal = match (aggregate.political_business_id, aggregate.counting_circle_id) {
            (Some(political_business_id), Some(counting_circle_id))
                if aggregate.state.is_done() && !next.state.is_done() =>
            {
                Some((political_business_id, counting_circle_id))
            }
            _ => None,
        };
        if let Some((political_business_id, counting_circle_id)) = withdrawal {
            self.end_results
                .withdraw_contribution(political_business_id, counting_circle_id)
                .await
                .map_err(|e| match e {
                    EndResultError::Finalized(id) => ResultError::EndResultFinalized(id),
                    e => e.into(),
                })?;
        }

        let envelopes = wrap_events(aggregate.id, aggregate.version, events.clone(), Uuid::new_v4(), actor);
        if let Err(error) = self
            .event_store
            .append_events(aggregate.id, aggregate.version, &envelopes)
            .await
        {
            self.note_append_failure(&error);
            if let Some((political_business_id, counting_circle_id)) = withdrawal {
                if let Err(reconcile_error) = self
                    .end_results
                    .reconcile_contribution(political_business_id, counting_circle_id)
                    .await
                {
                    self.note_projection_failure(aggregate.id, "end_result_reconcile", &reconcile_error);
                }
            }
            return Err(error.into());
        }
        if let Some(transaction_id) = approval {
            consume_approval(self.verifier.as_ref(), transaction_id).await;
        }
        self.metrics.record_events_appended("result", envelopes.len());
        self.metrics.record_transition(&action.to_string());

        tracing::info!(
            result_id = %aggregate.id,
            action = %action,
            from = ?aggregate.state,
            to = ?next.state,
            user_id = %actor.user_id,
            "Result command applied"
        );

        self.project(&aggregate, &next).await;
        Ok(events)
    }

    /// Audits or plausibilises many results; all streams are appended or none
    pub async fn transition_batch(
        &self,
        action: ResultAction,
        result_ids: &[Uuid],
        actor: &Actor,
    ) -> Result<Vec<ResultEvent>, ResultError> {
        if !action.is_batchable() {
            return Err(ResultError::NotBatchable(action));
        }
        let mut seen = HashSet::with_capacity(result_ids.len());
        if let Some(duplicate) = result_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(ResultError::Duplicate(*duplicate));
        }

        let now = Utc::now();
        let mut decided = Vec::with_capacity(result_ids.len());
        for result_id in result_ids {
            let aggregate = self.load(*result_id).await?;
            let publish_automatically = match self.context_of(&aggregate)? {
                Some(context) => self.publishes_automatically(&context),
                None => false,
            };
            let command = ResultCommand::for_transition(action, now, None, publish_automatically)
                .ok_or(ResultError::NotATransition(action))?;
            let events = aggregate.handle_command(&command)?;

            let mut next = aggregate.clone();
            for event in &events {
                next.apply_event(event)?;
            }
            decided.push((aggregate, next, events));
        }

        let correlation_id = Uuid::new_v4();
        let mut appends = Vec::with_capacity(decided.len());
        for (aggregate, _, events) in &decided {
            let envelopes = wrap_events(aggregate.id, aggregate.version, events.clone(), correlation_id, actor);
            appends.push(self.event_store.prepare(aggregate.id, aggregate.version, &envelopes)?);
        }
        let event_count = appends.iter().map(|a| a.events.len()).sum();
        self.event_store
            .append_prepared(appends)
            .await
            .inspect_err(|e| self.note_append_failure(e))?;
        self.metrics.record_events_appended("result", event_count);

        tracing::info!(
            action = %action,
            result_count = decided.len(),
            correlation_id = %correlation_id,
            "Batch transition applied"
        );

        let mut all_events = Vec::new();
        for (before, after, events) in decided {
            self.metrics.record_transition(&action.to_string());
            self.project(&before, &after).await;
            all_events.extend(events);
        }
        Ok(all_events)
    }

    fn note_append_failure(&self, error: &EventLogError) {
        if error.is_conflict() {
            self.metrics.record_conflict("result_append");
            tracing::warn!(error = %error, "Result stream changed concurrently");
        }
    }

    fn note_projection_failure(&self, result_id: Uuid, operation: &str, error: &dyn std::fmt::Display) {
        self.metrics.record_projection_failure(operation);
        tracing::warn!(
            result_id = %result_id,
            operation = operation,
            error = %error,
            "End result is behind the result stream until it is rebuilt"
        );
    }

    /// Adds the circle to its end result once it entered the done set. The
    /// events are already appended, so a failure here is only recorded.
    async fn project(&self, before: &ResultAggregate, after: &ResultAggregate) {
        let (Some(political_business_id), Some(counting_circle_id)) =
            (after.political_business_id, after.counting_circle_id)
        else {
            return;
        };
        if before.state.is_done() || !after.state.is_done() {
            return;
        }

        let snapshot = match after.snapshot() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return,
            Err(e) => {
                self.note_projection_failure(after.id, "end_result_add", &e);
                return;
            }
        };
        if let Err(e) = self
            .end_results
            .add_contribution(political_business_id, counting_circle_id, snapshot)
            .await
        {
            self.note_projection_failure(after.id, "end_result_add", &e);
        }
    }
}
