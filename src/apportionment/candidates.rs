use uuid::Uuid;

use super::lot_decision::{LotDecision, LotDecisionContext, LotDecisions};
use super::model::{CandidateRank, ListMandates};
use crate::domain::end_result::CandidateVotes;

pub(crate) struct MandateAssignment {
    pub mandates: ListMandates,
    pub applied: Vec<LotDecision>,
    pub pending: Option<LotDecisionContext>,
}

/// Elect the `seats` best candidates of a list. Equal-vote groups share a
/// rank unless a lot decision ranked them; an undecided group straddling
/// the last seat leaves the list pending.
pub(crate) fn assign(
    list_id: Uuid,
    seats: u32,
    candidates: &[CandidateVotes],
    decisions: &LotDecisions,
) -> MandateAssignment {
    let mut ordered = candidates.to_vec();
    ordered.sort_by(|a, b| b.votes.cmp(&a.votes));

    let mut ranked: Vec<(CandidateVotes, u32)> = Vec::with_capacity(ordered.len());
    let mut applied = Vec::new();
    let mut pending = None;
    let mut pending_span = None;

    for group in ordered.chunk_by(|a, b| a.votes == b.votes) {
        let first_rank = ranked.len() as u32 + 1;
        if group.len() == 1 {
            ranked.push((group[0], first_rank));
            continue;
        }

        let ids = group.iter().map(|c| c.candidate_id).collect();
        let context = LotDecisionContext::candidate_mandates(list_id, ids, first_rank);
        match decisions.ranks(&context) {
            Some(ranks) => {
                let mut decided: Vec<(CandidateVotes, u32)> = group
                    .iter()
                    .map(|c| (*c, ranks.get(&c.candidate_id).copied().unwrap_or(first_rank)))
                    .collect();
                decided.sort_by_key(|(_, rank)| *rank);
                ranked.extend(decided);
                applied.extend(decisions.get(&context));
            }
            None => {
                let last_rank = first_rank + group.len() as u32 - 1;
                if first_rank <= seats && seats < last_rank {
                    pending_span = Some(first_rank..=last_rank);
                    pending = Some(context);
                }
                ranked.extend(group.iter().map(|c| (*c, first_rank)));
            }
        }
    }

    let mut ranks = Vec::with_capacity(ranked.len());
    let mut elected = Vec::new();
    let mut substitutes = Vec::new();
    for (position, (candidate, rank)) in ranked.into_iter().enumerate() {
        let position = position as u32 + 1;
        let undecided = pending_span.as_ref().is_some_and(|span| span.contains(&position));
        let is_elected = !undecided && pending_span.as_ref().map_or(position <= seats, |span| position < *span.start());

        if is_elected {
            elected.push(candidate.candidate_id);
        } else if !undecided {
            substitutes.push(candidate.candidate_id);
        }
        ranks.push(CandidateRank {
            candidate_id: candidate.candidate_id,
            votes: candidate.votes,
            rank,
            elected: is_elected,
        });
    }

    MandateAssignment {
        mandates: ListMandates {
            list_id,
            seats,
            candidates: ranks,
            elected,
            substitutes,
            pending: pending.is_some(),
        },
        applied,
        pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apportionment::lot_decision::LotChoice;
    use std::collections::BTreeMap;

    fn candidates(votes: &[u64]) -> Vec<CandidateVotes> {
        votes
            .iter()
            .map(|&votes| CandidateVotes {
                candidate_id: Uuid::new_v4(),
                votes,
            })
            .collect()
    }

    #[test]
    fn test_best_candidates_are_elected() {
        let list = candidates(&[120, 300, 80, 200]);
        let result = assign(Uuid::new_v4(), 2, &list, &LotDecisions::new());

        assert_eq!(result.mandates.elected, vec![list[1].candidate_id, list[3].candidate_id]);
        assert_eq!(result.mandates.substitutes, vec![list[0].candidate_id, list[2].candidate_id]);
        assert!(!result.mandates.pending);
    }

    #[test]
    fn test_tie_inside_the_elected_block_shares_a_rank() {
        let list = candidates(&[300, 300, 100]);
        let result = assign(Uuid::new_v4(), 2, &list, &LotDecisions::new());

        assert!(result.pending.is_none());
        let ranks: Vec<u32> = result.mandates.candidates.iter().map(|c| c.rank).collect();
        assert_eq!(ranks, vec![1, 1, 3]);
        assert_eq!(result.mandates.elected.len(), 2);
    }

    #[test]
    fn test_straddling_tie_waits_for_ranks() {
        let list_id = Uuid::new_v4();
        let list = candidates(&[500, 200, 200, 100]);
        let undecided = assign(list_id, 2, &list, &LotDecisions::new());

        let context = undecided.pending.clone().unwrap();
        assert_eq!(
            context,
            LotDecisionContext::candidate_mandates(list_id, vec![list[1].candidate_id, list[2].candidate_id], 2)
        );
        assert!(undecided.mandates.pending);
        assert_eq!(undecided.mandates.elected, vec![list[0].candidate_id]);
        assert_eq!(undecided.mandates.substitutes, vec![list[3].candidate_id]);

        let decisions: LotDecisions = [LotDecision {
            context,
            choice: LotChoice::Ranks(BTreeMap::from([(list[1].candidate_id, 3), (list[2].candidate_id, 2)])),
        }]
        .into_iter()
        .collect();
        let decided = assign(list_id, 2, &list, &decisions);

        assert!(decided.pending.is_none());
        assert_eq!(decided.mandates.elected, vec![list[0].candidate_id, list[2].candidate_id]);
        assert_eq!(decided.mandates.substitutes, vec![list[1].candidate_id, list[3].candidate_id]);
        assert_eq!(decided.applied.len(), 1);
    }
}
