use uuid::Uuid;

use super::divisor;
use super::errors::ApportionmentError;
use super::lot_decision::{LotDecision, LotDecisionContext, LotDecisions};
use super::rational::Ratio;

/// List votes of a district divided by its seats, rounded half up
pub fn voter_number(votes: u64, seats: u32) -> u64 {
    if seats == 0 {
        return 0;
    }
    let seats = seats as u128;
    ((2 * votes as u128 + seats) / (2 * seats)) as u64
}

#[derive(Debug, Clone)]
pub(crate) struct SuperApportionment {
    /// Definite seats only while `pending` is set
    pub seats: Vec<u32>,
    pub divisor: Option<Ratio>,
    pub applied: Option<LotDecision>,
    pub pending: Option<LotDecisionContext>,
}

/// Seats per union list out of the whole house, weighted by voter numbers
pub(crate) fn apportion(
    row_ids: &[Uuid],
    voter_numbers: &[u64],
    house: u32,
    decisions: &LotDecisions,
) -> Result<SuperApportionment, ApportionmentError> {
    let weights: Vec<Ratio> = voter_numbers.iter().map(|&v| Ratio::integer(v)).collect();
    let mut allocation = divisor::apportion(&weights, house)?;

    let mut applied = None;
    if let Some(tie) = allocation.tie.clone() {
        let contenders: Vec<Uuid> = tie.contenders.iter().map(|&i| row_ids[i]).collect();
        let context = LotDecisionContext::super_apportionment(contenders, tie.seats);

        match decisions.winners(&context) {
            Some(winners) => {
                let winners: Vec<usize> = winners
                    .iter()
                    .filter_map(|w| row_ids.iter().position(|id| id == w))
                    .collect();
                tracing::debug!(seats = tie.seats, "Super-apportionment tie decided by lot");
                allocation.resolve(&winners);
                applied = decisions.get(&context);
            }
            None => {
                tracing::debug!(seats = tie.seats, "Super-apportionment tie awaits a lot decision");
                return Ok(SuperApportionment {
                    seats: allocation.seats,
                    divisor: None,
                    applied: None,
                    pending: Some(context),
                });
            }
        }
    }

    let divisor = allocation.divisor(&weights)?;
    Ok(SuperApportionment {
        seats: allocation.seats,
        divisor: Some(divisor),
        applied,
        pending: None,
    })
}
