use std::collections::BTreeMap;
use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use voting_tally::config::{EventLogBackend, TallyConfig};
use voting_tally::domain::end_result::{InMemoryEndResultStore, ViewScope};
use voting_tally::domain::result::{
    BallotResult, CountOfVoters, ListResult, ProportionalPayload, QuestionResult, ResultAction, ResultPayload,
    ResultState, VotePayload,
};
use voting_tally::domain::shared::{
    BallotDefinition, BusinessDefinition, ContestPolicy, CountingCircle, DomainOfInfluence, DomainOfInfluenceType,
    FlaggedDomainsOfInfluence, InMemoryCatalog, InMemorySecondFactorVerifier, ListDefinition, PoliticalBusiness,
};
use voting_tally::event_sourcing::core::{Actor, UnsignedEvents};
use voting_tally::event_sourcing::store::{EventLog, InMemoryEventLog, ScyllaEventLog};
use voting_tally::metrics::Metrics;
use voting_tally::utils::{retry_with_backoff, RetryConfig, RetryResult};
use voting_tally::{Collaborators, TallyService};

/// Demo contest: one canton, two municipalities, one vote and one
/// proportional election with three lists
struct DemoContest {
    contest_id: Uuid,
    circles: [Uuid; 2],
    vote_id: Uuid,
    ballot_id: Uuid,
    election_id: Uuid,
    lists: Vec<ListDefinition>,
}

impl DemoContest {
    fn new() -> Self {
        let lists = (1..=3)
            .map(|n| ListDefinition {
                id: Uuid::new_v4(),
                order_number: format!("{:02}", n),
                candidate_ids: (0..3).map(|_| Uuid::new_v4()).collect(),
            })
            .collect();
        Self {
            contest_id: Uuid::new_v4(),
            circles: [Uuid::new_v4(), Uuid::new_v4()],
            vote_id: Uuid::new_v4(),
            ballot_id: Uuid::new_v4(),
            election_id: Uuid::new_v4(),
            lists,
        }
    }

    fn catalog(&self) -> InMemoryCatalog {
        let canton = Uuid::new_v4();
        let mut catalog = InMemoryCatalog::new()
            .with_contest_policy(ContestPolicy {
                second_factor_required: false,
                ..ContestPolicy::new(self.contest_id)
            })
            .with_domain_of_influence(DomainOfInfluence {
                id: canton,
                name: "Canton".into(),
                doi_type: DomainOfInfluenceType::Ct,
                parent_id: None,
            });

        for (n, circle) in self.circles.iter().enumerate() {
            let municipality = Uuid::new_v4();
            catalog = catalog
                .with_domain_of_influence(DomainOfInfluence {
                    id: municipality,
                    name: format!("Municipality {}", n + 1),
                    doi_type: DomainOfInfluenceType::Mu,
                    parent_id: Some(canton),
                })
                .with_counting_circle(CountingCircle {
                    id: *circle,
                    name: format!("Counting circle {}", n + 1),
                    domain_of_influence_id: municipality,
                });
        }

        catalog
            .with_political_business(PoliticalBusiness {
                id: self.vote_id,
                contest_id: self.contest_id,
                domain_of_influence_id: canton,
                counting_circle_ids: self.circles.to_vec(),
                definition: BusinessDefinition::Vote {
                    ballots: vec![BallotDefinition {
                        id: self.ballot_id,
                        question_count: 1,
                        tie_break_question_count: 0,
                    }],
                },
            })
            .with_political_business(PoliticalBusiness {
                id: self.election_id,
                contest_id: self.contest_id,
                domain_of_influence_id: canton,
                counting_circle_ids: self.circles.to_vec(),
                definition: BusinessDefinition::ProportionalElection {
                    number_of_mandates: 5,
                    lists: self.lists.clone(),
                },
            })
    }

    fn vote_payload(&self, yes: u64, no: u64) -> ResultPayload {
        ResultPayload::Vote(VotePayload {
            ballots: vec![BallotResult {
                ballot_id: self.ballot_id,
                accounted_ballots: yes + no,
                questions: vec![QuestionResult {
                    question_number: 1,
                    yes,
                    no,
                    unspecified: 0,
                }],
                tie_break_questions: Vec::new(),
            }],
        })
    }

    fn election_payload(&self, candidate_votes: [[u64; 3]; 3]) -> ResultPayload {
        let lists = self
            .lists
            .iter()
            .zip(candidate_votes)
            .map(|(list, votes)| {
                let result = ListResult {
                    unmodified_ballots: 0,
                    modified_ballots: 0,
                    blank_rows_votes: 0,
                    candidate_votes: list.candidate_ids.iter().copied().zip(votes).collect::<BTreeMap<_, _>>(),
                };
                (list.id, result)
            })
            .collect();
        ResultPayload::Proportional(ProportionalPayload {
            lists,
            ballots_without_list: 0,
        })
    }
}

async fn event_log(config: &TallyConfig) -> anyhow::Result<Arc<dyn EventLog>> {
    match config.event_log.backend {
        EventLogBackend::Memory => {
            tracing::info!("Using in-memory event log");
            Ok(Arc::new(InMemoryEventLog::new()))
        }
        EventLogBackend::Scylla => {
            let settings = &config.event_log;
            let outcome = retry_with_backoff(&RetryConfig::startup(), move |_| {
                ScyllaEventLog::connect(&settings.known_node, &settings.keyspace, settings.replication_factor)
            })
            .await;
            match outcome {
                RetryResult::Success(log) => Ok(Arc::new(log)),
                RetryResult::Failed(e) | RetryResult::PermanentFailure(e) => Err(e),
            }
        }
    }
}

/// Enters, finishes and audits one counting circle
async fn count_circle(
    service: &TallyService,
    political_business_id: Uuid,
    counting_circle_id: Uuid,
    payload: ResultPayload,
    count_of_voters: CountOfVoters,
) -> anyhow::Result<()> {
    let election_officer = Actor::new("election-officer", "demo");
    let monitor = Actor::new("monitor", "demo");
    let result_id = TallyService::result_id(political_business_id, counting_circle_id);

    service
        .start_submission(political_business_id, counting_circle_id, &election_officer)
        .await?;
    service
        .submit(result_id, payload, ResultState::SubmissionOngoing, &election_officer)
        .await?;
    service
        .enter_count_of_voters(result_id, count_of_voters, &election_officer)
        .await?;
    service
        .transition_state(result_id, ResultAction::SubmissionFinished, None, None, &election_officer)
        .await?;
    service
        .transition_state(result_id, ResultAction::AuditedTentatively, None, None, &monitor)
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = TallyConfig::load()?;

    // Initialize structured logging with environment-based filtering.
    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let json = config.logging.json;
    tracing_subscriber::registry()
        .with(json.then(|| fmt::layer().json().with_target(true).with_thread_ids(true)))
        .with((!json).then(|| fmt::layer().with_target(true).with_thread_ids(true)))
        .with(filter)
        .init();

    tracing::info!("Starting voting tally demo");

    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("Metrics registry created with {} metric families", metrics.registry().gather().len());

    let demo = DemoContest::new();
    let collaborators = Collaborators {
        event_log: event_log(&config).await?,
        signer: Arc::new(UnsignedEvents),
        catalog: Arc::new(demo.catalog()),
        verifier: Arc::new(InMemorySecondFactorVerifier::new()),
        visibility: Arc::new(FlaggedDomainsOfInfluence::default()),
        end_result_store: Arc::new(InMemoryEndResultStore::new()),
    };
    let service = TallyService::new(collaborators, &config, metrics.clone());

    let voters = |accounted: u64| CountOfVoters {
        received_ballots: accounted + 12,
        accounted_ballots: accounted,
        blank_ballots: 8,
        invalid_ballots: 4,
    };

    count_circle(&service, demo.vote_id, demo.circles[0], demo.vote_payload(1200, 800), voters(2000)).await?;
    count_circle(&service, demo.vote_id, demo.circles[1], demo.vote_payload(450, 650), voters(1100)).await?;

    let vote = service.get_end_result(demo.vote_id, ViewScope::Full).await?;
    tracing::info!(end_result = %serde_json::to_string(&vote.totals)?, "Vote end result");

    count_circle(
        &service,
        demo.election_id,
        demo.circles[0],
        demo.election_payload([[900, 600, 300], [700, 500, 100], [400, 200, 100]]),
        voters(1300),
    )
    .await?;
    count_circle(
        &service,
        demo.election_id,
        demo.circles[1],
        demo.election_payload([[300, 250, 50], [500, 300, 200], [100, 90, 10]]),
        voters(1000),
    )
    .await?;

    match service.compute_apportionment(demo.election_id).await {
        Ok(result) => {
            for row in &result.super_apportionment {
                tracing::info!(list_id = %row.union_list_id, voter_number = row.voter_number, seats = row.seats, "Seats");
            }
            tracing::info!(status = ?result.status, pending = result.pending_lot_decisions.len(), "Apportionment");
        }
        Err(e) => {
            tracing::warn!(error = %e, pending = e.pending_lot_decisions().len(), "Apportionment not possible");
        }
    }

    tracing::info!("Demo complete");
    Ok(())
}
