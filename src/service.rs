use std::sync::Arc;

use uuid::Uuid;

use crate::apportionment::{
    ApportionmentResult, ApportionmentService, LotChoice, LotDecision, LotDecisionContext, LotDecisionEvent,
    LotDecisions,
};
use crate::config::TallyConfig;
use crate::domain::end_result::{EndResultAggregator, EndResultEvent, EndResultStore, EndResultView, ViewScope};
use crate::domain::result::{CountOfVoters, ResultAction, ResultAggregate, ResultCommand, ResultCommandHandler, ResultEvent, ResultPayload, ResultState};
use crate::domain::shared::{counting_circle_result_id, PartialResultVisibility, PoliticalBusinessCatalog, SecondFactorVerifier};
use crate::error::TallyError;
use crate::event_sourcing::core::{Actor, SignatureService};
use crate::event_sourcing::store::{EventLog, EventStore};
use crate::metrics::Metrics;

// ============================================================================
// Tally Service - external interface
// ============================================================================
//
// Wires the result lifecycle, the end-result aggregator and the
// apportionment service over one event log, and reports every failure as a
// `TallyError`.
//
// ============================================================================

/// Ports the engine consumes
pub struct Collaborators {
    pub event_log: Arc<dyn EventLog>,
    pub signer: Arc<dyn SignatureService>,
    pub catalog: Arc<dyn PoliticalBusinessCatalog>,
    pub verifier: Arc<dyn SecondFactorVerifier>,
    pub visibility: Arc<dyn PartialResultVisibility>,
    pub end_result_store: Arc<dyn EndResultStore>,
}

pub struct TallyService {
    results: ResultCommandHandler,
    end_results: Arc<EndResultAggregator>,
    apportionment: ApportionmentService,
}

impl TallyService {
    pub fn new(collaborators: Collaborators, config: &TallyConfig, metrics: Arc<Metrics>) -> Self {
        let Collaborators {
            event_log,
            signer,
            catalog,
            verifier,
            visibility,
            end_result_store,
        } = collaborators;

        let result_events = EventStore::<ResultEvent>::new(event_log.clone(), signer.clone(), "result");
        let finalization_events = EventStore::<EndResultEvent>::new(event_log.clone(), signer.clone(), "end_result");
        let lot_events = EventStore::<LotDecisionEvent>::new(event_log, signer, "lot_decision");

        let end_results = Arc::new(EndResultAggregator::new(
            end_result_store,
            catalog.clone(),
            result_events.clone(),
            finalization_events,
            verifier.clone(),
            visibility,
            config.retry_config(),
            metrics.clone(),
        ));
        let results = ResultCommandHandler::new(result_events, catalog.clone(), verifier, end_results.clone(), metrics.clone());
        let apportionment = ApportionmentService::new(
            catalog,
            end_results.clone(),
            lot_events,
            config.apportionment.max_iterations,
            metrics,
        );

        Self {
            results,
            end_results,
            apportionment,
        }
    }

    // ========================================================================
    // Result lifecycle
    // ========================================================================

    /// Id of the result stream of a counting circle in a political business
    pub fn result_id(political_business_id: Uuid, counting_circle_id: Uuid) -> Uuid {
        counting_circle_result_id(political_business_id, counting_circle_id)
    }

    pub async fn result(&self, result_id: Uuid) -> Result<ResultAggregate, TallyError> {
        Ok(self.results.load(result_id).await?)
    }

    pub async fn start_submission(
        &self,
        political_business_id: Uuid,
        counting_circle_id: Uuid,
        actor: &Actor,
    ) -> Result<Vec<ResultEvent>, TallyError> {
        Ok(self
            .results
            .start_submission(political_business_id, counting_circle_id, actor)
            .await?)
    }

    /// Enter (or replace) the data of a result still open for entries
    pub async fn submit(
        &self,
        result_id: Uuid,
        payload: ResultPayload,
        expected_state: ResultState,
        actor: &Actor,
    ) -> Result<Vec<ResultEvent>, TallyError> {
        Ok(self.results.enter_results(result_id, expected_state, payload, actor).await?)
    }

    pub async fn enter_count_of_voters(
        &self,
        result_id: Uuid,
        count_of_voters: CountOfVoters,
        actor: &Actor,
    ) -> Result<Vec<ResultEvent>, TallyError> {
        Ok(self.results.enter_count_of_voters(result_id, count_of_voters, actor).await?)
    }

    pub async fn transition_state(
        &self,
        result_id: Uuid,
        action: ResultAction,
        second_factor: Option<&str>,
        comment: Option<String>,
        actor: &Actor,
    ) -> Result<Vec<ResultEvent>, TallyError> {
        Ok(self
            .results
            .transition(result_id, action, second_factor, comment, actor)
            .await?)
    }

    pub async fn transition_batch(
        &self,
        action: ResultAction,
        result_ids: &[Uuid],
        actor: &Actor,
    ) -> Result<Vec<ResultEvent>, TallyError> {
        Ok(self.results.transition_batch(action, result_ids, actor).await?)
    }

    pub async fn bundle(&self, result_id: Uuid, command: ResultCommand, actor: &Actor) -> Result<Vec<ResultEvent>, TallyError> {
        Ok(self.results.bundle(result_id, command, actor).await?)
    }

    pub async fn second_factor_action_id(&self, result_id: Uuid, action: ResultAction) -> Result<String, TallyError> {
        Ok(self.results.second_factor_action_id(result_id, action).await?)
    }

    // ========================================================================
    // End results
    // ========================================================================

    pub async fn get_end_result(&self, political_business_id: Uuid, scope: ViewScope) -> Result<EndResultView, TallyError> {
        Ok(self.end_results.get_end_result(political_business_id, scope).await?)
    }

    pub async fn finalization_action_id(&self, political_business_id: Uuid, finalize: bool) -> Result<String, TallyError> {
        Ok(self
            .end_results
            .finalization_action_id(political_business_id, finalize)
            .await?)
    }

    pub async fn finalize_end_result(
        &self,
        political_business_id: Uuid,
        second_factor: Option<&str>,
        actor: &Actor,
    ) -> Result<Vec<EndResultEvent>, TallyError> {
        Ok(self.end_results.finalize(political_business_id, second_factor, actor).await?)
    }

    pub async fn revert_end_result_finalization(
        &self,
        political_business_id: Uuid,
        second_factor: Option<&str>,
        actor: &Actor,
    ) -> Result<Vec<EndResultEvent>, TallyError> {
        Ok(self
            .end_results
            .revert_finalization(political_business_id, second_factor, actor)
            .await?)
    }

    /// Recomputes the end result from the event log
    pub async fn rebuild_end_result(&self, political_business_id: Uuid) -> Result<EndResultView, TallyError> {
        self.end_results.rebuild(political_business_id).await?;
        self.get_end_result(political_business_id, ViewScope::Full).await
    }

    // ========================================================================
    // Apportionment
    // ========================================================================

    pub async fn compute_apportionment(&self, subject_id: Uuid) -> Result<ApportionmentResult, TallyError> {
        Ok(self.apportionment.compute(subject_id).await?)
    }

    pub async fn pending_lot_decisions(&self, subject_id: Uuid) -> Result<Vec<LotDecisionContext>, TallyError> {
        Ok(self.apportionment.pending_lot_decisions(subject_id).await?)
    }

    pub async fn lot_decisions(&self, subject_id: Uuid) -> Result<LotDecisions, TallyError> {
        Ok(self.apportionment.lot_decisions(subject_id).await?)
    }

    pub async fn record_lot_decision(
        &self,
        subject_id: Uuid,
        context: LotDecisionContext,
        choice: LotChoice,
        actor: &Actor,
    ) -> Result<LotDecisionEvent, TallyError> {
        Ok(self
            .apportionment
            .record_lot_decision(subject_id, LotDecision { context, choice }, actor)
            .await?)
    }
}
