use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use super::engine;
use super::errors::ApportionmentError;
use super::lot_decision::{LotDecision, LotDecisionCommand, LotDecisionContext, LotDecisionEvent, LotDecisionLog, LotDecisions};
use super::model::{ApportionmentInput, ApportionmentResult, ApportionmentStatus, CellInput, DistrictInput, RowInput};
use crate::domain::end_result::{EndResultAggregator, EndResultTotals, ProportionalEndResult};
use crate::domain::shared::{
    lot_decision_stream_id, BusinessDefinition, ListDefinition, PoliticalBusiness, PoliticalBusinessCatalog,
};
use crate::event_sourcing::core::{wrap_events, Actor, Aggregate};
use crate::event_sourcing::store::EventStore;
use crate::metrics::Metrics;

// ============================================================================
// Apportionment Service
// ============================================================================
//
// Feeds the pure engine from the catalog, the complete end results of every
// district and the lot decisions recorded for the subject. The subject is a
// proportional election union, or a standalone proportional election that
// is apportioned as a single district whose rows are its lists.
//
// ============================================================================

pub struct ApportionmentService {
    catalog: Arc<dyn PoliticalBusinessCatalog>,
    end_results: Arc<EndResultAggregator>,
    lot_events: EventStore<LotDecisionEvent>,
    max_iterations: u32,
    metrics: Arc<Metrics>,
}

/// A subject's districts and rows before lot decisions are attached
struct Subject {
    contest_id: Uuid,
    districts: Vec<DistrictInput>,
    rows: Vec<RowInput>,
}

impl ApportionmentService {
    pub fn new(
        catalog: Arc<dyn PoliticalBusinessCatalog>,
        end_results: Arc<EndResultAggregator>,
        lot_events: EventStore<LotDecisionEvent>,
        max_iterations: u32,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            catalog,
            end_results,
            lot_events,
            max_iterations,
            metrics,
        }
    }

    fn contest_of(&self, subject_id: Uuid) -> Result<Uuid, ApportionmentError> {
        match self.catalog.proportional_election_union(subject_id) {
            Some(union) => Ok(union.contest_id),
            None => Ok(self.proportional_election(subject_id)?.contest_id),
        }
    }

    fn proportional_election(&self, id: Uuid) -> Result<PoliticalBusiness, ApportionmentError> {
        let business = self
            .catalog
            .political_business(id)
            .ok_or(ApportionmentError::UnknownSubject(id))?;
        match business.definition {
            BusinessDefinition::ProportionalElection { .. } => Ok(business),
            _ => Err(ApportionmentError::NotProportional(id)),
        }
    }

    /// Totals of a district; apportionment runs on complete end results only
    async fn district_totals(&self, election: &PoliticalBusiness) -> Result<ProportionalEndResult, ApportionmentError> {
        let end_result = self.end_results.end_result(election.id).await?;
        if !end_result.is_complete() {
            return Err(ApportionmentError::EndResultIncomplete {
                political_business_id: election.id,
                done: end_result.count_of_done_counting_circles(),
                total: end_result.total_count_of_counting_circles,
            });
        }
        match end_result.totals {
            EndResultTotals::Proportional(totals) => Ok(totals),
            _ => Err(ApportionmentError::NotProportional(election.id)),
        }
    }

    fn cell(list_id: Uuid, totals: &ProportionalEndResult) -> CellInput {
        let list = totals.list(list_id);
        CellInput {
            list_id,
            votes: list.map_or(0, |l| l.list_votes),
            candidates: list.map(|l| l.candidates.clone()).unwrap_or_default(),
        }
    }

    async fn subject(&self, subject_id: Uuid) -> Result<Subject, ApportionmentError> {
        if let Some(union) = self.catalog.proportional_election_union(subject_id) {
            let mut districts = Vec::with_capacity(union.election_ids.len());
            let mut totals = BTreeMap::new();
            let mut district_of_list = BTreeMap::new();

            for election_id in &union.election_ids {
                let election = self.proportional_election(*election_id)?;
                for list in election.lists() {
                    district_of_list.insert(list.id, election.id);
                }
                totals.insert(election.id, self.district_totals(&election).await?);
                districts.push(DistrictInput {
                    id: election.id,
                    seats: election.number_of_mandates(),
                });
            }

            let mut rows = Vec::with_capacity(union.union_lists.len());
            for union_list in &union.union_lists {
                let mut cells = BTreeMap::new();
                for list_id in &union_list.list_ids {
                    let Some(district_id) = district_of_list.get(list_id) else {
                        tracing::warn!(union_list_id = %union_list.id, list_id = %list_id, "Union list refers to a list outside the union");
                        continue;
                    };
                    if let Some(district_totals) = totals.get(district_id) {
                        cells.insert(*district_id, Self::cell(*list_id, district_totals));
                    }
                }
                rows.push(RowInput {
                    id: union_list.id,
                    cells,
                });
            }

            return Ok(Subject {
                contest_id: union.contest_id,
                districts,
                rows,
            });
        }

        let election = self.proportional_election(subject_id)?;
        let totals = self.district_totals(&election).await?;
        let mut lists = election.lists().to_vec();
        sort_by_order_number(&mut lists);

        let rows = lists
            .iter()
            .map(|list| RowInput {
                id: list.id,
                cells: BTreeMap::from([(election.id, Self::cell(list.id, &totals))]),
            })
            .collect();

        Ok(Subject {
            contest_id: election.contest_id,
            districts: vec![DistrictInput {
                id: election.id,
                seats: election.number_of_mandates(),
            }],
            rows,
        })
    }

    pub async fn lot_decisions(&self, subject_id: Uuid) -> Result<LotDecisions, ApportionmentError> {
        let log: LotDecisionLog = self.lot_events.load_aggregate(lot_decision_stream_id(subject_id)).await?;
        Ok(log.decisions)
    }

    async fn input(&self, subject_id: Uuid, lot_decisions: LotDecisions) -> Result<ApportionmentInput, ApportionmentError> {
        let subject = self.subject(subject_id).await?;
        let policy = self
            .catalog
            .contest_policy(subject.contest_id)
            .ok_or(ApportionmentError::UnknownContest(subject.contest_id))?;

        Ok(ApportionmentInput {
            subject_id,
            districts: subject.districts,
            rows: subject.rows,
            quorum: policy.quorum,
            max_iterations: self.max_iterations,
            lot_decisions,
        })
    }

    fn run(&self, input: &ApportionmentInput) -> Result<ApportionmentResult, ApportionmentError> {
        let started = Instant::now();
        let outcome = engine::apportion(input);
        let elapsed = started.elapsed().as_secs_f64();

        let label = match &outcome {
            Ok(result) if result.status == ApportionmentStatus::Complete => "complete",
            Ok(_) => "pending_lot_decisions",
            Err(ApportionmentError::NonConvergence { .. }) => "non_convergence",
            Err(_) => "failed",
        };
        self.metrics.record_apportionment(label, elapsed);
        outcome
    }

    pub async fn compute(&self, subject_id: Uuid) -> Result<ApportionmentResult, ApportionmentError> {
        let decisions = self.lot_decisions(subject_id).await?;
        let input = self.input(subject_id, decisions).await?;
        let result = self.run(&input)?;

        tracing::info!(
            subject_id = %subject_id,
            status = ?result.status,
            iterations = result.iterations,
            pending = result.pending_lot_decisions.len(),
            "Apportionment computed"
        );
        Ok(result)
    }

    /// Decisions the current data still needs
    pub async fn pending_lot_decisions(&self, subject_id: Uuid) -> Result<Vec<LotDecisionContext>, ApportionmentError> {
        let decisions = self.lot_decisions(subject_id).await?;
        let input = self.input(subject_id, decisions).await?;
        pending_of(self.run(&input))
    }

    pub async fn record_lot_decision(
        &self,
        subject_id: Uuid,
        decision: LotDecision,
        actor: &Actor,
    ) -> Result<LotDecisionEvent, ApportionmentError> {
        let contest_id = self.contest_of(subject_id)?;
        let locked = self
            .catalog
            .contest_policy(contest_id)
            .is_some_and(|policy| policy.locked);
        if locked {
            return Err(ApportionmentError::ContestLocked(contest_id));
        }

        let stream_id = lot_decision_stream_id(subject_id);
        let log: LotDecisionLog = self.lot_events.load_aggregate(stream_id).await?;
        let input = self.input(subject_id, log.decisions.clone()).await?;

        // an already decided context is rejected before pending is consulted
        let pending = if log.decisions.contains(&decision.context) {
            Vec::new()
        } else {
            pending_of(self.run(&input))?
        };

        let events = log.handle_command(&LotDecisionCommand::Record {
            subject_id,
            decision,
            pending,
            at: Utc::now(),
        })?;
        let envelopes = wrap_events(stream_id, log.version(), events.clone(), Uuid::new_v4(), actor);
        self.lot_events
            .append_events(stream_id, log.version(), &envelopes)
            .await
            .inspect_err(|e| {
                if e.is_conflict() {
                    self.metrics.record_conflict("lot_decision");
                }
            })?;
        self.metrics.record_events_appended("lot_decision", envelopes.len());

        tracing::info!(
            subject_id = %subject_id,
            user_id = %actor.user_id,
            "Lot decision recorded"
        );
        events
            .into_iter()
            .next()
            .ok_or(ApportionmentError::LotDecisionNotPending)
    }
}

fn pending_of(outcome: Result<ApportionmentResult, ApportionmentError>) -> Result<Vec<LotDecisionContext>, ApportionmentError> {
    match outcome {
        Ok(result) => Ok(result.pending_lot_decisions),
        Err(ApportionmentError::NonConvergence { pending, .. }) => Ok(pending),
        Err(other) => Err(other),
    }
}

/// Numeric order numbers first, in numeric order ("2" before "10"), then
/// the rest by text
fn sort_by_order_number(lists: &mut [ListDefinition]) {
    lists.sort_by_cached_key(|list| {
        let number = list.order_number.trim().parse::<u64>().ok();
        (number.is_none(), number, list.order_number.clone())
    });
}
