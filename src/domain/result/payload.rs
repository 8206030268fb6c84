use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::ResultError;
use super::value_objects::CountOfVoters;
use crate::domain::shared::{BusinessDefinition, PoliticalBusiness, PoliticalBusinessType};

// ============================================================================
// Result Payloads - entered data per political business type
// ============================================================================
//
// One lifecycle serves all business types; the data it carries is this
// tagged union. Maps are ordered so that serialized payloads (and therefore
// second-factor action hashes) are stable.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ResultPayload {
    Vote(VotePayload),
    Majority(MajorityPayload),
    Proportional(ProportionalPayload),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotePayload {
    pub ballots: Vec<BallotResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotResult {
    pub ballot_id: Uuid,
    pub accounted_ballots: u64,
    pub questions: Vec<QuestionResult>,
    #[serde(default)]
    pub tie_break_questions: Vec<TieBreakQuestionResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_number: u32,
    pub yes: u64,
    pub no: u64,
    pub unspecified: u64,
}

/// Preference between two accepted questions of a variant ballot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TieBreakQuestionResult {
    pub question_number: u32,
    pub question1: u64,
    pub question2: u64,
    pub unspecified: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MajorityPayload {
    pub candidate_votes: BTreeMap<Uuid, u64>,
    pub individual_votes: u64,
    pub empty_votes: u64,
    pub invalid_votes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProportionalPayload {
    pub lists: BTreeMap<Uuid, ListResult>,
    /// Ballots without a list designation
    #[serde(default)]
    pub ballots_without_list: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResult {
    pub unmodified_ballots: u64,
    pub modified_ballots: u64,
    /// Empty lines on ballots of this list, counted as list votes
    pub blank_rows_votes: u64,
    pub candidate_votes: BTreeMap<Uuid, u64>,
}

impl ListResult {
    /// `None` when the sum does not fit
    pub fn candidate_votes_total(&self) -> Option<u64> {
        self.candidate_votes.values().try_fold(0u64, |sum, v| sum.checked_add(*v))
    }

    /// Votes the list takes into apportionment
    pub fn list_votes(&self) -> Option<u64> {
        self.candidate_votes_total()?.checked_add(self.blank_rows_votes)
    }

    fn add(&mut self, other: &ListResult) -> Result<(), ResultError> {
        self.unmodified_ballots = sum(self.unmodified_ballots, other.unmodified_ballots)?;
        self.modified_ballots = sum(self.modified_ballots, other.modified_ballots)?;
        self.blank_rows_votes = sum(self.blank_rows_votes, other.blank_rows_votes)?;
        add_votes(&mut self.candidate_votes, &other.candidate_votes)
    }
}

fn sum(a: u64, b: u64) -> Result<u64, ResultError> {
    a.checked_add(b).ok_or_else(overflow)
}

fn overflow() -> ResultError {
    ResultError::InvalidPayload("counts are too large".into())
}

fn add_votes(into: &mut BTreeMap<Uuid, u64>, from: &BTreeMap<Uuid, u64>) -> Result<(), ResultError> {
    for (id, votes) in from {
        let total = into.entry(*id).or_default();
        *total = sum(*total, *votes)?;
    }
    Ok(())
}

impl ResultPayload {
    pub fn empty(business_type: PoliticalBusinessType) -> Self {
        match business_type {
            PoliticalBusinessType::Vote => ResultPayload::Vote(VotePayload::default()),
            PoliticalBusinessType::MajorityElection => ResultPayload::Majority(MajorityPayload::default()),
            PoliticalBusinessType::ProportionalElection => {
                ResultPayload::Proportional(ProportionalPayload::default())
            }
        }
    }

    pub fn business_type(&self) -> PoliticalBusinessType {
        match self {
            ResultPayload::Vote(_) => PoliticalBusinessType::Vote,
            ResultPayload::Majority(_) => PoliticalBusinessType::MajorityElection,
            ResultPayload::Proportional(_) => PoliticalBusinessType::ProportionalElection,
        }
    }

    /// Adds a bundle tally. Bundles only exist for elections.
    pub fn add(&mut self, other: &ResultPayload) -> Result<(), ResultError> {
        match (self, other) {
            (ResultPayload::Majority(into), ResultPayload::Majority(from)) => {
                add_votes(&mut into.candidate_votes, &from.candidate_votes)?;
                into.individual_votes = sum(into.individual_votes, from.individual_votes)?;
                into.empty_votes = sum(into.empty_votes, from.empty_votes)?;
                into.invalid_votes = sum(into.invalid_votes, from.invalid_votes)?;
                Ok(())
            }
            (ResultPayload::Proportional(into), ResultPayload::Proportional(from)) => {
                for (list_id, list) in &from.lists {
                    into.lists.entry(*list_id).or_default().add(list)?;
                }
                into.ballots_without_list = sum(into.ballots_without_list, from.ballots_without_list)?;
                Ok(())
            }
            (into, from) => Err(ResultError::PayloadTypeMismatch {
                expected: into.business_type(),
                got: from.business_type(),
            }),
        }
    }
}

/// What a done result contributes to its end result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSnapshot {
    pub payload: ResultPayload,
    pub count_of_voters: CountOfVoters,
}

// ============================================================================
// Validation Strategies
// ============================================================================

/// Business-definition checks for one payload variant
pub trait PayloadValidator: Send + Sync {
    fn validate(&self, payload: &ResultPayload, business: &PoliticalBusiness) -> Result<(), ResultError>;
}

pub struct VotePayloadValidator;
pub struct MajorityPayloadValidator;
pub struct ProportionalPayloadValidator;

static VOTE_VALIDATOR: VotePayloadValidator = VotePayloadValidator;
static MAJORITY_VALIDATOR: MajorityPayloadValidator = MajorityPayloadValidator;
static PROPORTIONAL_VALIDATOR: ProportionalPayloadValidator = ProportionalPayloadValidator;

pub fn validator_for(business_type: PoliticalBusinessType) -> &'static dyn PayloadValidator {
    match business_type {
        PoliticalBusinessType::Vote => &VOTE_VALIDATOR,
        PoliticalBusinessType::MajorityElection => &MAJORITY_VALIDATOR,
        PoliticalBusinessType::ProportionalElection => &PROPORTIONAL_VALIDATOR,
    }
}

/// Checks the variant against the business and runs the variant's validator
pub fn validate_payload(payload: &ResultPayload, business: &PoliticalBusiness) -> Result<(), ResultError> {
    if payload.business_type() != business.business_type() {
        return Err(ResultError::PayloadTypeMismatch {
            expected: business.business_type(),
            got: payload.business_type(),
        });
    }
    validator_for(payload.business_type()).validate(payload, business)
}

impl PayloadValidator for VotePayloadValidator {
    fn validate(&self, payload: &ResultPayload, business: &PoliticalBusiness) -> Result<(), ResultError> {
        let (ResultPayload::Vote(vote), BusinessDefinition::Vote { ballots }) = (payload, &business.definition)
        else {
            return Err(ResultError::InvalidPayload("vote payload for a non-vote business".into()));
        };

        let mut seen = HashSet::new();
        for ballot in &vote.ballots {
            if !seen.insert(ballot.ballot_id) {
                return Err(ResultError::InvalidPayload(format!("ballot {} entered twice", ballot.ballot_id)));
            }
            let definition = ballots
                .iter()
                .find(|b| b.id == ballot.ballot_id)
                .ok_or(ResultError::UnknownBallot(ballot.ballot_id))?;

            for question in &ballot.questions {
                if question.question_number == 0 || question.question_number > definition.question_count {
                    return Err(ResultError::InvalidPayload(format!(
                        "ballot {} has no question {}",
                        ballot.ballot_id, question.question_number
                    )));
                }
                let answered = sum(question.yes, question.no).and_then(|n| sum(n, question.unspecified))?;
                if answered != ballot.accounted_ballots {
                    return Err(ResultError::InvalidPayload(format!(
                        "question {} of ballot {} sums to {} but {} ballots were accounted",
                        question.question_number, ballot.ballot_id, answered, ballot.accounted_ballots
                    )));
                }
            }
            for question in &ballot.tie_break_questions {
                if question.question_number == 0 || question.question_number > definition.tie_break_question_count {
                    return Err(ResultError::InvalidPayload(format!(
                        "ballot {} has no tie-break question {}",
                        ballot.ballot_id, question.question_number
                    )));
                }
                let answered = sum(question.question1, question.question2).and_then(|n| sum(n, question.unspecified))?;
                if answered != ballot.accounted_ballots {
                    return Err(ResultError::InvalidPayload(format!(
                        "tie-break question {} of ballot {} sums to {} but {} ballots were accounted",
                        question.question_number, ballot.ballot_id, answered, ballot.accounted_ballots
                    )));
                }
            }
        }
        Ok(())
    }
}

impl PayloadValidator for MajorityPayloadValidator {
    fn validate(&self, payload: &ResultPayload, business: &PoliticalBusiness) -> Result<(), ResultError> {
        let (
            ResultPayload::Majority(majority),
            BusinessDefinition::MajorityElection { candidate_ids, .. },
        ) = (payload, &business.definition)
        else {
            return Err(ResultError::InvalidPayload("majority payload for a non-majority business".into()));
        };

        if let Some(unknown) = majority.candidate_votes.keys().find(|id| !candidate_ids.contains(id)) {
            return Err(ResultError::UnknownCandidate(*unknown));
        }
        // every vote of the circle has to fit into one sum
        majority
            .candidate_votes
            .values()
            .chain([&majority.individual_votes, &majority.empty_votes, &majority.invalid_votes])
            .try_fold(0u64, |total, v| sum(total, *v))?;
        Ok(())
    }
}

impl PayloadValidator for ProportionalPayloadValidator {
    fn validate(&self, payload: &ResultPayload, business: &PoliticalBusiness) -> Result<(), ResultError> {
        let ResultPayload::Proportional(proportional) = payload else {
            return Err(ResultError::InvalidPayload("proportional payload expected".into()));
        };

        let lists = business.lists();
        for (list_id, list) in &proportional.lists {
            let definition = lists
                .iter()
                .find(|l| l.id == *list_id)
                .ok_or(ResultError::UnknownList(*list_id))?;
            if let Some(unknown) = list.candidate_votes.keys().find(|c| !definition.candidate_ids.contains(c)) {
                return Err(ResultError::UnknownCandidate(*unknown));
            }
        }

        let mut total = proportional.ballots_without_list;
        for list in proportional.lists.values() {
            let list_votes = list.list_votes().ok_or_else(overflow)?;
            total = sum(total, list_votes)?;
            total = sum(total, list.unmodified_ballots)?;
            total = sum(total, list.modified_ballots)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shared::{BallotDefinition, ListDefinition};

    fn business(definition: BusinessDefinition) -> PoliticalBusiness {
        PoliticalBusiness {
            id: Uuid::new_v4(),
            contest_id: Uuid::new_v4(),
            domain_of_influence_id: Uuid::new_v4(),
            counting_circle_ids: vec![],
            definition,
        }
    }

    #[test]
    fn test_vote_question_sums_must_match_accounted_ballots() {
        let ballot_id = Uuid::new_v4();
        let vote = business(BusinessDefinition::Vote {
            ballots: vec![BallotDefinition {
                id: ballot_id,
                question_count: 1,
                tie_break_question_count: 0,
            }],
        });
        let mut payload = VotePayload {
            ballots: vec![BallotResult {
                ballot_id,
                accounted_ballots: 100,
                questions: vec![QuestionResult {
                    question_number: 1,
                    yes: 60,
                    no: 35,
                    unspecified: 5,
                }],
                tie_break_questions: vec![],
            }],
        };
        assert!(validate_payload(&ResultPayload::Vote(payload.clone()), &vote).is_ok());

        payload.ballots[0].questions[0].no = 36;
        assert!(matches!(
            validate_payload(&ResultPayload::Vote(payload), &vote),
            Err(ResultError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_variant_must_match_business_type() {
        let majority = business(BusinessDefinition::MajorityElection {
            number_of_mandates: 1,
            candidate_ids: vec![],
        });
        let result = validate_payload(&ResultPayload::Vote(VotePayload::default()), &majority);
        assert!(matches!(result, Err(ResultError::PayloadTypeMismatch { .. })));
    }

    #[test]
    fn test_unknown_candidate_and_list() {
        let known = Uuid::new_v4();
        let majority = business(BusinessDefinition::MajorityElection {
            number_of_mandates: 1,
            candidate_ids: vec![known],
        });
        let mut votes = MajorityPayload::default();
        votes.candidate_votes.insert(known, 10);
        assert!(validate_payload(&ResultPayload::Majority(votes.clone()), &majority).is_ok());
        let stranger = Uuid::new_v4();
        votes.candidate_votes.insert(stranger, 1);
        assert!(matches!(
            validate_payload(&ResultPayload::Majority(votes), &majority),
            Err(ResultError::UnknownCandidate(id)) if id == stranger
        ));

        let list = ListDefinition {
            id: Uuid::new_v4(),
            order_number: "01".into(),
            candidate_ids: vec![],
        };
        let proportional = business(BusinessDefinition::ProportionalElection {
            number_of_mandates: 3,
            lists: vec![list],
        });
        let mut payload = ProportionalPayload::default();
        let foreign = Uuid::new_v4();
        payload.lists.insert(foreign, ListResult::default());
        assert!(matches!(
            validate_payload(&ResultPayload::Proportional(payload), &proportional),
            Err(ResultError::UnknownList(id)) if id == foreign
        ));
    }

    #[test]
    fn test_add_bundle_tallies() {
        let list = Uuid::new_v4();
        let candidate = Uuid::new_v4();
        let mut entered = ProportionalPayload::default();
        entered.lists.insert(
            list,
            ListResult {
                unmodified_ballots: 3,
                blank_rows_votes: 2,
                candidate_votes: BTreeMap::from([(candidate, 5)]),
                ..Default::default()
            },
        );
        let mut total = ResultPayload::Proportional(entered.clone());
        total.add(&ResultPayload::Proportional(entered)).unwrap();

        let ResultPayload::Proportional(total) = total else { unreachable!() };
        assert_eq!(total.lists[&list].list_votes(), Some(14));
        assert_eq!(total.lists[&list].unmodified_ballots, 6);

        let mut vote = ResultPayload::Vote(VotePayload::default());
        assert!(vote.add(&ResultPayload::Majority(MajorityPayload::default())).is_err());
    }

    #[test]
    fn test_counts_that_overflow_are_rejected() {
        let ballot_id = Uuid::new_v4();
        let vote = business(BusinessDefinition::Vote {
            ballots: vec![BallotDefinition {
                id: ballot_id,
                question_count: 1,
                tie_break_question_count: 0,
            }],
        });
        let payload = VotePayload {
            ballots: vec![BallotResult {
                ballot_id,
                accounted_ballots: 0,
                questions: vec![QuestionResult {
                    question_number: 1,
                    yes: u64::MAX,
                    no: 1,
                    unspecified: 0,
                }],
                tie_break_questions: vec![],
            }],
        };
        assert!(matches!(
            validate_payload(&ResultPayload::Vote(payload), &vote),
            Err(ResultError::InvalidPayload(_))
        ));

        let candidate = Uuid::new_v4();
        let list = ListDefinition {
            id: Uuid::new_v4(),
            order_number: "01".into(),
            candidate_ids: vec![candidate],
        };
        let proportional = business(BusinessDefinition::ProportionalElection {
            number_of_mandates: 3,
            lists: vec![list.clone()],
        });
        let mut entered = ProportionalPayload::default();
        entered.lists.insert(
            list.id,
            ListResult {
                blank_rows_votes: 1,
                candidate_votes: BTreeMap::from([(candidate, u64::MAX)]),
                ..Default::default()
            },
        );
        assert!(matches!(
            validate_payload(&ResultPayload::Proportional(entered.clone()), &proportional),
            Err(ResultError::InvalidPayload(_))
        ));

        let mut total = ResultPayload::Proportional(entered.clone());
        assert!(matches!(
            total.add(&ResultPayload::Proportional(entered)),
            Err(ResultError::InvalidPayload(_))
        ));

        let majority = business(BusinessDefinition::MajorityElection {
            number_of_mandates: 1,
            candidate_ids: vec![candidate],
        });
        let votes = MajorityPayload {
            candidate_votes: BTreeMap::from([(candidate, u64::MAX)]),
            empty_votes: 1,
            ..Default::default()
        };
        assert!(matches!(
            validate_payload(&ResultPayload::Majority(votes), &majority),
            Err(ResultError::InvalidPayload(_))
        ));
    }
}
