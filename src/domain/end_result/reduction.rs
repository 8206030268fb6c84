use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::EndResultError;
use crate::domain::result::{CountOfVoters, MajorityPayload, ProportionalPayload, ResultPayload, ResultSnapshot, VotePayload};
use crate::domain::shared::{BusinessDefinition, PoliticalBusiness};

// ============================================================================
// Reductions - counting-circle snapshots folded into end-result totals
// ============================================================================
//
// Totals are always recomputed from the full set of contributing circles,
// never patched incrementally, so they equal the reduction over exactly the
// circles that are currently done.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EndResultTotals {
    Vote(VoteEndResult),
    Majority(MajorityEndResult),
    Proportional(ProportionalEndResult),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteEndResult {
    pub count_of_voters: CountOfVoters,
    pub ballots: Vec<BallotEndResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotEndResult {
    pub ballot_id: Uuid,
    pub questions: Vec<QuestionEndResult>,
    pub tie_break_questions: Vec<TieBreakQuestionEndResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionEndResult {
    pub question_number: u32,
    pub yes: u64,
    pub no: u64,
    pub unspecified: u64,
    /// Popular majority
    pub accepted: bool,
    pub counting_circles_accepted: u32,
    pub counting_circles_rejected: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TieBreakQuestionEndResult {
    pub question_number: u32,
    pub question1: u64,
    pub question2: u64,
    pub unspecified: u64,
    pub question1_preferred: bool,
    pub counting_circles_question1: u32,
    pub counting_circles_question2: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MajorityEndResult {
    pub count_of_voters: CountOfVoters,
    pub candidates: Vec<CandidateEndResult>,
    pub candidate_votes_total: u64,
    pub individual_votes: u64,
    pub empty_votes: u64,
    pub invalid_votes: u64,
    /// `None` for an election without mandates
    pub absolute_majority: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateEndResult {
    pub candidate_id: Uuid,
    pub votes: u64,
    /// Equal votes share a rank
    pub rank: u32,
    pub elected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProportionalEndResult {
    pub count_of_voters: CountOfVoters,
    pub ballots_without_list: u64,
    pub lists: Vec<ListEndResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEndResult {
    pub list_id: Uuid,
    pub unmodified_ballots: u64,
    pub modified_ballots: u64,
    pub blank_rows_votes: u64,
    pub list_votes: u64,
    pub candidates: Vec<CandidateVotes>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateVotes {
    pub candidate_id: Uuid,
    pub votes: u64,
}

impl ProportionalEndResult {
    pub fn list_votes(&self) -> BTreeMap<Uuid, u64> {
        self.lists.iter().map(|l| (l.list_id, l.list_votes)).collect()
    }

    pub fn list(&self, list_id: Uuid) -> Option<&ListEndResult> {
        self.lists.iter().find(|l| l.list_id == list_id)
    }
}

impl EndResultTotals {
    /// Totals of a business no counting circle contributed to yet
    pub fn empty(business: &PoliticalBusiness) -> Self {
        let mut totals = Self::initial(business);
        totals.finish(business);
        totals
    }

    fn initial(business: &PoliticalBusiness) -> Self {
        match &business.definition {
            BusinessDefinition::Vote { ballots } => EndResultTotals::Vote(VoteEndResult {
                count_of_voters: CountOfVoters::default(),
                ballots: ballots
                    .iter()
                    .map(|b| BallotEndResult {
                        ballot_id: b.id,
                        questions: (1..=b.question_count)
                            .map(|n| QuestionEndResult {
                                question_number: n,
                                ..Default::default()
                            })
                            .collect(),
                        tie_break_questions: (1..=b.tie_break_question_count)
                            .map(|n| TieBreakQuestionEndResult {
                                question_number: n,
                                ..Default::default()
                            })
                            .collect(),
                    })
                    .collect(),
            }),
            BusinessDefinition::MajorityElection { candidate_ids, .. } => EndResultTotals::Majority(MajorityEndResult {
                candidates: candidate_ids
                    .iter()
                    .map(|id| CandidateEndResult {
                        candidate_id: *id,
                        votes: 0,
                        rank: 0,
                        elected: false,
                    })
                    .collect(),
                ..Default::default()
            }),
            BusinessDefinition::ProportionalElection { .. } => EndResultTotals::Proportional(ProportionalEndResult {
                lists: business
                    .lists()
                    .iter()
                    .map(|l| ListEndResult {
                        list_id: l.id,
                        unmodified_ballots: 0,
                        modified_ballots: 0,
                        blank_rows_votes: 0,
                        list_votes: 0,
                        candidates: l
                            .candidate_ids
                            .iter()
                            .map(|c| CandidateVotes {
                                candidate_id: *c,
                                votes: 0,
                            })
                            .collect(),
                    })
                    .collect(),
                ..Default::default()
            }),
        }
    }

    fn add(&mut self, snapshot: &ResultSnapshot) -> Result<(), EndResultError> {
        match (self, &snapshot.payload) {
            (EndResultTotals::Vote(totals), ResultPayload::Vote(vote)) => {
                totals.count_of_voters = add_voters(&totals.count_of_voters, &snapshot.count_of_voters)?;
                add_vote(totals, vote)
            }
            (EndResultTotals::Majority(totals), ResultPayload::Majority(majority)) => {
                totals.count_of_voters = add_voters(&totals.count_of_voters, &snapshot.count_of_voters)?;
                add_majority(totals, majority)
            }
            (EndResultTotals::Proportional(totals), ResultPayload::Proportional(proportional)) => {
                totals.count_of_voters = add_voters(&totals.count_of_voters, &snapshot.count_of_voters)?;
                add_proportional(totals, proportional)
            }
            // a payload of another business type contributes nothing
            _ => Ok(()),
        }
    }

    fn finish(&mut self, business: &PoliticalBusiness) {
        match self {
            EndResultTotals::Vote(totals) => {
                for ballot in &mut totals.ballots {
                    for q in &mut ballot.questions {
                        q.accepted = q.yes > q.no;
                    }
                    for q in &mut ballot.tie_break_questions {
                        q.question1_preferred = q.question1 > q.question2;
                    }
                }
            }
            EndResultTotals::Majority(totals) => {
                let BusinessDefinition::MajorityElection { number_of_mandates, .. } = &business.definition else {
                    return;
                };
                totals.absolute_majority = absolute_majority(totals.candidate_votes_total, *number_of_mandates);
                let ordered: Vec<(Uuid, u64)> = totals.candidates.iter().map(|c| (c.candidate_id, c.votes)).collect();
                let absolute_majority = totals.absolute_majority;
                totals.candidates = rank_by_votes(&ordered)
                    .into_iter()
                    .map(|(candidate_id, votes, rank)| CandidateEndResult {
                        candidate_id,
                        votes,
                        rank,
                        elected: absolute_majority.is_some_and(|m| votes >= m) && rank <= *number_of_mandates,
                    })
                    .collect();
            }
            EndResultTotals::Proportional(_) => {}
        }
    }
}

/// Folds the snapshots of the contributing circles; sums that do not fit
/// fail with `CountOverflow`
pub fn reduce<'a>(
    business: &PoliticalBusiness,
    snapshots: impl IntoIterator<Item = &'a ResultSnapshot>,
) -> Result<EndResultTotals, EndResultError> {
    let mut totals = EndResultTotals::initial(business);
    for snapshot in snapshots {
        totals.add(snapshot)?;
    }
    totals.finish(business);
    Ok(totals)
}

fn add(total: &mut u64, value: u64) -> Result<(), EndResultError> {
    *total = total.checked_add(value).ok_or(EndResultError::CountOverflow)?;
    Ok(())
}

fn add_voters(total: &CountOfVoters, other: &CountOfVoters) -> Result<CountOfVoters, EndResultError> {
    total.checked_add(other).ok_or(EndResultError::CountOverflow)
}

fn add_vote(totals: &mut VoteEndResult, vote: &VotePayload) -> Result<(), EndResultError> {
    for entered in &vote.ballots {
        let Some(ballot) = totals.ballots.iter_mut().find(|b| b.ballot_id == entered.ballot_id) else {
            continue;
        };
        for q in &entered.questions {
            if let Some(total) = ballot.questions.iter_mut().find(|t| t.question_number == q.question_number) {
                add(&mut total.yes, q.yes)?;
                add(&mut total.no, q.no)?;
                add(&mut total.unspecified, q.unspecified)?;
                if q.yes > q.no {
                    total.counting_circles_accepted += 1;
                } else {
                    total.counting_circles_rejected += 1;
                }
            }
        }
        for q in &entered.tie_break_questions {
            if let Some(total) = ballot
                .tie_break_questions
                .iter_mut()
                .find(|t| t.question_number == q.question_number)
            {
                add(&mut total.question1, q.question1)?;
                add(&mut total.question2, q.question2)?;
                add(&mut total.unspecified, q.unspecified)?;
                if q.question1 > q.question2 {
                    total.counting_circles_question1 += 1;
                } else if q.question2 > q.question1 {
                    total.counting_circles_question2 += 1;
                }
            }
        }
    }
    Ok(())
}

/// floor((candidate votes / mandates) / 2) + 1
pub fn absolute_majority(candidate_votes_total: u64, number_of_mandates: u32) -> Option<u64> {
    if number_of_mandates == 0 {
        return None;
    }
    Some(candidate_votes_total / (2 * u64::from(number_of_mandates)) + 1)
}

/// Competition ranks (1, 1, 3, ...) by descending votes
pub fn rank_by_votes(votes: &[(Uuid, u64)]) -> Vec<(Uuid, u64, u32)> {
    let mut sorted: Vec<(usize, Uuid, u64)> = votes.iter().enumerate().map(|(i, (id, v))| (i, *id, *v)).collect();
    sorted.sort_by(|a, b| b.2.cmp(&a.2).then(a.0.cmp(&b.0)));

    let mut ranked = Vec::with_capacity(sorted.len());
    let mut rank = 0u32;
    let mut previous = None;
    for (position, (_, id, v)) in sorted.into_iter().enumerate() {
        if previous != Some(v) {
            rank = position as u32 + 1;
            previous = Some(v);
        }
        ranked.push((id, v, rank));
    }
    ranked
}

fn add_majority(totals: &mut MajorityEndResult, majority: &MajorityPayload) -> Result<(), EndResultError> {
    for (candidate_id, votes) in &majority.candidate_votes {
        if let Some(candidate) = totals.candidates.iter_mut().find(|c| c.candidate_id == *candidate_id) {
            add(&mut candidate.votes, *votes)?;
            add(&mut totals.candidate_votes_total, *votes)?;
        }
    }
    add(&mut totals.individual_votes, majority.individual_votes)?;
    add(&mut totals.empty_votes, majority.empty_votes)?;
    add(&mut totals.invalid_votes, majority.invalid_votes)
}

fn add_proportional(totals: &mut ProportionalEndResult, proportional: &ProportionalPayload) -> Result<(), EndResultError> {
    add(&mut totals.ballots_without_list, proportional.ballots_without_list)?;
    for (list_id, entered) in &proportional.lists {
        let Some(list) = totals.lists.iter_mut().find(|l| l.list_id == *list_id) else {
            continue;
        };
        add(&mut list.unmodified_ballots, entered.unmodified_ballots)?;
        add(&mut list.modified_ballots, entered.modified_ballots)?;
        add(&mut list.blank_rows_votes, entered.blank_rows_votes)?;
        add(&mut list.list_votes, entered.blank_rows_votes)?;
        for (candidate_id, votes) in &entered.candidate_votes {
            add(&mut list.list_votes, *votes)?;
            if let Some(candidate) = list.candidates.iter_mut().find(|c| c.candidate_id == *candidate_id) {
                add(&mut candidate.votes, *votes)?;
            }
        }
    }
    Ok(())
}
