use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::config::TallyConfig;
use crate::domain::end_result::{
    EndResult, EndResultError, EndResultStore, EndResultTotals, EndResultView, InMemoryEndResultStore, QuestionEndResult,
};
use crate::domain::result::{
    BallotResult, CountOfVoters, ListResult, ProportionalPayload, QuestionResult, ResultAction, ResultPayload,
    ResultState, VotePayload,
};
use crate::domain::shared::{
    BallotDefinition, BusinessDefinition, ContestPolicy, CountingCircle, DomainOfInfluence, DomainOfInfluenceType,
    FlaggedDomainsOfInfluence, InMemoryCatalog, InMemorySecondFactorVerifier, ListDefinition, PoliticalBusiness,
    ProportionalElectionUnion, SecondFactorTransaction, UnionList,
};
use crate::event_sourcing::core::{Actor, UnsignedEvents};
use crate::event_sourcing::store::{EventLog, EventLogError, InMemoryEventLog, StoredEvent, StreamAppend};
use crate::metrics::Metrics;
use crate::service::{Collaborators, TallyService};

// ============================================================================
// Test Contest
// ============================================================================
//
// Canton with two districts. District A has municipalities a1, a2 and
// district B has b1; every municipality is one counting circle.
//
// - a cantonal vote with one ballot and one question, counted everywhere
// - a union of two proportional elections, one per district (6 and 4
//   seats), each with three lists joined into three union lists
//
// ============================================================================

pub(crate) struct Contest {
    pub contest_id: Uuid,
    pub canton: Uuid,
    pub districts: [Uuid; 2],
    pub municipalities: [Uuid; 3],
    pub circles: [Uuid; 3],
    pub vote_id: Uuid,
    pub ballot_id: Uuid,
    pub union_id: Uuid,
    pub elections: [Uuid; 2],
    /// `lists[election][union list]`
    pub lists: [[Uuid; 3]; 2],
    /// Candidates per list, four in district A, three in district B
    pub candidates: BTreeMap<Uuid, Vec<Uuid>>,
    pub union_lists: [Uuid; 3],
}

fn ids<const N: usize>() -> [Uuid; N] {
    std::array::from_fn(|_| Uuid::new_v4())
}

impl Contest {
    pub fn new() -> Self {
        let lists: [[Uuid; 3]; 2] = [ids(), ids()];
        let mut candidates = BTreeMap::new();
        for (election, per_election) in lists.iter().enumerate() {
            let count = if election == 0 { 4 } else { 3 };
            for list_id in per_election {
                candidates.insert(*list_id, (0..count).map(|_| Uuid::new_v4()).collect());
            }
        }

        Self {
            contest_id: Uuid::new_v4(),
            canton: Uuid::new_v4(),
            districts: ids(),
            municipalities: ids(),
            circles: ids(),
            vote_id: Uuid::new_v4(),
            ballot_id: Uuid::new_v4(),
            union_id: Uuid::new_v4(),
            elections: ids(),
            lists,
            candidates,
            union_lists: ids(),
        }
    }

    /// No second factor, manual publication
    pub fn policy(&self) -> ContestPolicy {
        ContestPolicy {
            second_factor_required: false,
            ..ContestPolicy::new(self.contest_id)
        }
    }

    /// Circles of a district's election
    pub fn election_circles(&self, election: usize) -> Vec<Uuid> {
        match election {
            0 => vec![self.circles[0], self.circles[1]],
            _ => vec![self.circles[2]],
        }
    }

    pub fn catalog(&self, policy: ContestPolicy) -> InMemoryCatalog {
        let mut catalog = InMemoryCatalog::new()
            .with_contest_policy(policy)
            .with_domain_of_influence(DomainOfInfluence {
                id: self.canton,
                name: "Canton".into(),
                doi_type: DomainOfInfluenceType::Ct,
                parent_id: None,
            });

        for (index, district) in self.districts.iter().enumerate() {
            catalog = catalog.with_domain_of_influence(DomainOfInfluence {
                id: *district,
                name: format!("District {}", index + 1),
                doi_type: DomainOfInfluenceType::Bz,
                parent_id: Some(self.canton),
            });
        }
        let parents = [self.districts[0], self.districts[0], self.districts[1]];
        for (index, (municipality, circle)) in self.municipalities.iter().zip(&self.circles).enumerate() {
            catalog = catalog
                .with_domain_of_influence(DomainOfInfluence {
                    id: *municipality,
                    name: format!("Municipality {}", index + 1),
                    doi_type: DomainOfInfluenceType::Mu,
                    parent_id: Some(parents[index]),
                })
                .with_counting_circle(CountingCircle {
                    id: *circle,
                    name: format!("Circle {}", index + 1),
                    domain_of_influence_id: *municipality,
                });
        }

        catalog = catalog.with_political_business(PoliticalBusiness {
            id: self.vote_id,
            contest_id: self.contest_id,
            domain_of_influence_id: self.canton,
            counting_circle_ids: self.circles.to_vec(),
            definition: BusinessDefinition::Vote {
                ballots: vec![BallotDefinition {
                    id: self.ballot_id,
                    question_count: 1,
                    tie_break_question_count: 0,
                }],
            },
        });

        let seats = [6, 4];
        for (election, election_id) in self.elections.iter().enumerate() {
            let lists = self.lists[election]
                .iter()
                .enumerate()
                .map(|(order, list_id)| ListDefinition {
                    id: *list_id,
                    order_number: format!("{:02}", order + 1),
                    candidate_ids: self.candidates[list_id].clone(),
                })
                .collect();
            catalog = catalog.with_political_business(PoliticalBusiness {
                id: *election_id,
                contest_id: self.contest_id,
                domain_of_influence_id: self.districts[election],
                counting_circle_ids: self.election_circles(election),
                definition: BusinessDefinition::ProportionalElection {
                    number_of_mandates: seats[election],
                    lists,
                },
            });
        }

        catalog.with_union(ProportionalElectionUnion {
            id: self.union_id,
            contest_id: self.contest_id,
            election_ids: self.elections.to_vec(),
            union_lists: self
                .union_lists
                .iter()
                .enumerate()
                .map(|(row, id)| UnionList {
                    id: *id,
                    short_description: format!("UL{}", row + 1),
                    list_ids: vec![self.lists[0][row], self.lists[1][row]],
                })
                .collect(),
        })
    }

    pub fn vote_payload(&self, yes: u64, no: u64) -> ResultPayload {
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

    /// List votes of one circle, spread over the list's candidates with
    /// weights n, n-1, ..., 1 (remainder to the first)
    pub fn list_payload(&self, election: usize, list_votes: [u64; 3]) -> ResultPayload {
        let mut lists = BTreeMap::new();
        for (list_id, votes) in self.lists[election].iter().zip(list_votes) {
            let candidates = &self.candidates[list_id];
            let n = candidates.len() as u64;
            let weight_sum = n * (n + 1) / 2;
            let mut candidate_votes: BTreeMap<Uuid, u64> = candidates
                .iter()
                .enumerate()
                .map(|(i, id)| (*id, votes * (n - i as u64) / weight_sum))
                .collect();
            let assigned: u64 = candidate_votes.values().sum();
            *candidate_votes.entry(candidates[0]).or_default() += votes - assigned;

            lists.insert(
                *list_id,
                ListResult {
                    unmodified_ballots: 0,
                    modified_ballots: 0,
                    blank_rows_votes: 0,
                    candidate_votes,
                },
            );
        }
        ResultPayload::Proportional(ProportionalPayload {
            lists,
            ballots_without_list: 0,
        })
    }
}

pub(crate) fn count_of_voters(accounted: u64) -> CountOfVoters {
    CountOfVoters {
        received_ballots: accounted + 3,
        accounted_ballots: accounted,
        blank_ballots: 2,
        invalid_ballots: 1,
    }
}

/// Totals of the single vote question
pub(crate) fn question(view: &EndResultView) -> QuestionEndResult {
    match &view.totals {
        EndResultTotals::Vote(vote) => vote.ballots[0].questions[0].clone(),
        other => panic!("vote totals expected, got {:?}", other),
    }
}

pub(crate) fn actor() -> Actor {
    Actor::new("erfasser", "tenant-1")
}

pub(crate) fn monitor() -> Actor {
    Actor::new("monitor", "tenant-1")
}

// ============================================================================
// Ports that fail on demand
// ============================================================================

/// In-memory event log whose next append can be made to fail
#[derive(Default)]
pub(crate) struct FlakyEventLog {
    inner: InMemoryEventLog,
    fail_next: AtomicBool,
}

impl FlakyEventLog {
    pub fn fail_next_append(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventLog for FlakyEventLog {
    async fn append_batch(&self, appends: Vec<StreamAppend>) -> Result<Vec<i64>, EventLogError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(EventLogError::Backend(anyhow::anyhow!("connection reset")));
        }
        self.inner.append_batch(appends).await
    }

    async fn read_stream(&self, stream_id: Uuid) -> Result<Vec<StoredEvent>, EventLogError> {
        self.inner.read_stream(stream_id).await
    }

    async fn current_version(&self, stream_id: Uuid) -> Result<i64, EventLogError> {
        self.inner.current_version(stream_id).await
    }
}

/// In-memory end-result store whose next write can be made to fail
#[derive(Default)]
pub(crate) struct FlakyEndResultStore {
    inner: InMemoryEndResultStore,
    fail_next: AtomicBool,
}

impl FlakyEndResultStore {
    pub fn fail_next_put(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl EndResultStore for FlakyEndResultStore {
    async fn get(&self, political_business_id: Uuid) -> Result<Option<EndResult>, EndResultError> {
        self.inner.get(political_business_id).await
    }

    async fn put(&self, end_result: EndResult, expected_version: u64) -> Result<u64, EndResultError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(EndResultError::Store("disk full".into()));
        }
        self.inner.put(end_result, expected_version).await
    }
}

// ============================================================================
// Harness
// ============================================================================

pub(crate) struct Harness {
    pub contest: Contest,
    pub verifier: Arc<InMemorySecondFactorVerifier>,
    pub event_log: Arc<FlakyEventLog>,
    pub end_result_store: Arc<FlakyEndResultStore>,
    pub metrics: Arc<Metrics>,
    pub service: TallyService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_policy(|_| {})
    }

    pub fn with_policy(adjust: impl FnOnce(&mut ContestPolicy)) -> Self {
        let contest = Contest::new();
        let mut policy = contest.policy();
        adjust(&mut policy);

        let verifier = Arc::new(InMemorySecondFactorVerifier::new());
        let event_log = Arc::new(FlakyEventLog::default());
        let end_result_store = Arc::new(FlakyEndResultStore::default());
        let metrics = Arc::new(Metrics::new().unwrap());
        let collaborators = Collaborators {
            event_log: event_log.clone(),
            signer: Arc::new(UnsignedEvents),
            catalog: Arc::new(contest.catalog(policy)),
            verifier: verifier.clone(),
            visibility: Arc::new(FlaggedDomainsOfInfluence::new([contest.districts[0]])),
            end_result_store: end_result_store.clone(),
        };
        let service = TallyService::new(collaborators, &TallyConfig::default(), metrics.clone());

        Self {
            contest,
            verifier,
            event_log,
            end_result_store,
            metrics,
            service,
        }
    }

    /// Registers a verified transaction for `action_id` and returns its id
    pub async fn approve(&self, action_id: String) -> String {
        let id = Uuid::new_v4().to_string();
        self.verifier
            .register(SecondFactorTransaction {
                id: id.clone(),
                action_id,
                verified: true,
                consumed: false,
                expires_at: Utc::now() + Duration::minutes(5),
            })
            .await;
        id
    }

    /// Starts a submission, enters `payload` and finishes it; returns the result id
    pub async fn submit_circle(&self, political_business_id: Uuid, counting_circle_id: Uuid, payload: ResultPayload, accounted: u64) -> Uuid {
        let result_id = TallyService::result_id(political_business_id, counting_circle_id);
        self.service
            .start_submission(political_business_id, counting_circle_id, &actor())
            .await
            .unwrap();
        self.service
            .submit(result_id, payload, ResultState::SubmissionOngoing, &actor())
            .await
            .unwrap();
        self.service
            .enter_count_of_voters(result_id, count_of_voters(accounted), &actor())
            .await
            .unwrap();
        self.service
            .transition_state(result_id, ResultAction::SubmissionFinished, None, None, &actor())
            .await
            .unwrap();
        result_id
    }

    /// Submits and audits, which moves the circle into the done set
    pub async fn complete_circle(&self, political_business_id: Uuid, counting_circle_id: Uuid, payload: ResultPayload, accounted: u64) -> Uuid {
        let result_id = self
            .submit_circle(political_business_id, counting_circle_id, payload, accounted)
            .await;
        self.service
            .transition_state(result_id, ResultAction::AuditedTentatively, None, None, &monitor())
            .await
            .unwrap();
        result_id
    }

    /// Completes both union elections with list votes [[4000, 300], [2000,
    /// 1500], [1000, 1400]] (union list x district)
    pub async fn complete_union(&self) {
        let c = &self.contest;
        self.complete_circle(c.elections[0], c.circles[0], c.list_payload(0, [2500, 1200, 600]), 800)
            .await;
        self.complete_circle(c.elections[0], c.circles[1], c.list_payload(0, [1500, 800, 400]), 500)
            .await;
        self.complete_circle(c.elections[1], c.circles[2], c.list_payload(1, [300, 1500, 1400]), 600)
            .await;
    }
}
