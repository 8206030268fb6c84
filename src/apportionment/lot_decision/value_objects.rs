use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::apportionment::errors::ApportionmentError;

/// The axis refitted when a sub-apportionment tie occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Row step: contenders are districts of this union list
    UnionList(Uuid),
    /// Column step: contenders are union lists in this district
    District(Uuid),
}

/// What a lot decides. Contender ids are kept sorted, so two runs over the
/// same data produce equal contexts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum LotDecisionContext {
    SuperApportionment {
        contenders: Vec<Uuid>,
        seats: u32,
    },
    SubApportionment {
        axis: Axis,
        contenders: Vec<Uuid>,
        seats: u32,
    },
    CandidateMandates {
        list_id: Uuid,
        candidates: Vec<Uuid>,
        first_rank: u32,
    },
}

impl LotDecisionContext {
    pub fn super_apportionment(mut contenders: Vec<Uuid>, seats: u32) -> Self {
        contenders.sort();
        Self::SuperApportionment { contenders, seats }
    }

    pub fn sub_apportionment(axis: Axis, mut contenders: Vec<Uuid>, seats: u32) -> Self {
        contenders.sort();
        Self::SubApportionment { axis, contenders, seats }
    }

    pub fn candidate_mandates(list_id: Uuid, mut candidates: Vec<Uuid>, first_rank: u32) -> Self {
        candidates.sort();
        Self::CandidateMandates {
            list_id,
            candidates,
            first_rank,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum LotChoice {
    /// Contenders that get the open seats
    Winners(Vec<Uuid>),
    /// Explicit rank of every tied candidate
    Ranks(BTreeMap<Uuid, u32>),
}

fn invalid(message: impl Into<String>) -> ApportionmentError {
    ApportionmentError::InvalidLotChoice(message.into())
}

impl LotChoice {
    pub fn validate(&self, context: &LotDecisionContext) -> Result<(), ApportionmentError> {
        match (context, self) {
            (LotDecisionContext::SuperApportionment { contenders, seats }, LotChoice::Winners(winners))
            | (LotDecisionContext::SubApportionment { contenders, seats, .. }, LotChoice::Winners(winners)) => {
                let distinct: BTreeSet<_> = winners.iter().collect();
                if distinct.len() != winners.len() {
                    return Err(invalid("winners must be distinct"));
                }
                if winners.len() != *seats as usize {
                    return Err(invalid(format!("expected {} winner(s), got {}", seats, winners.len())));
                }
                if let Some(outsider) = winners.iter().find(|w| !contenders.contains(*w)) {
                    return Err(invalid(format!("{} is not a contender", outsider)));
                }
                Ok(())
            }
            (
                LotDecisionContext::CandidateMandates {
                    candidates, first_rank, ..
                },
                LotChoice::Ranks(ranks),
            ) => {
                let ranked: BTreeSet<_> = ranks.keys().collect();
                let tied: BTreeSet<_> = candidates.iter().collect();
                if ranked != tied {
                    return Err(invalid("ranks must cover exactly the tied candidates"));
                }
                let given: BTreeSet<u32> = ranks.values().copied().collect();
                let span: BTreeSet<u32> = (*first_rank..*first_rank + candidates.len() as u32).collect();
                if given != span {
                    return Err(invalid(format!(
                        "ranks must be a permutation of {}..={}",
                        first_rank,
                        first_rank + candidates.len() as u32 - 1
                    )));
                }
                Ok(())
            }
            _ => Err(invalid("choice does not fit the kind of lot decision")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotDecision {
    pub context: LotDecisionContext,
    pub choice: LotChoice,
}

/// Recorded decisions of one apportionment subject
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LotDecisions {
    by_context: BTreeMap<LotDecisionContext, LotChoice>,
}

impl LotDecisions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, decision: LotDecision) {
        self.by_context.insert(decision.context, decision.choice);
    }

    pub fn contains(&self, context: &LotDecisionContext) -> bool {
        self.by_context.contains_key(context)
    }

    pub fn get(&self, context: &LotDecisionContext) -> Option<LotDecision> {
        self.by_context.get(context).map(|choice| LotDecision {
            context: context.clone(),
            choice: choice.clone(),
        })
    }

    pub fn winners(&self, context: &LotDecisionContext) -> Option<&[Uuid]> {
        match self.by_context.get(context) {
            Some(LotChoice::Winners(winners)) => Some(winners.as_slice()),
            _ => None,
        }
    }

    pub fn ranks(&self, context: &LotDecisionContext) -> Option<&BTreeMap<Uuid, u32>> {
        match self.by_context.get(context) {
            Some(LotChoice::Ranks(ranks)) => Some(ranks),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.by_context.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_context.is_empty()
    }
}

impl FromIterator<LotDecision> for LotDecisions {
    fn from_iter<I: IntoIterator<Item = LotDecision>>(iter: I) -> Self {
        let mut decisions = Self::new();
        for decision in iter {
            decisions.insert(decision);
        }
        decisions
    }
}
