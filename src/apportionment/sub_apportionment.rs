use uuid::Uuid;

use super::divisor::{self, DivisorApportionment};
use super::errors::ApportionmentError;
use super::lot_decision::{Axis, LotDecision, LotDecisionContext, LotDecisions};
use super::rational::Ratio;

// ============================================================================
// Sub-Apportionment by Alternating Scaling
// ============================================================================
//
// Rows are union lists, columns are districts. Column divisors start from a
// per-district apportionment, row divisors at 1. Each iteration refits all
// rows to their super-apportionment seats, then all columns to their
// district seats, until the other marginal matches too.
//
// ============================================================================

#[derive(Debug, Clone)]
pub(crate) struct SubApportionment {
    pub seats: Vec<Vec<u32>>,
    pub row_divisors: Vec<Ratio>,
    pub column_divisors: Vec<Ratio>,
    pub iterations: u32,
    pub applied: Vec<LotDecision>,
}

pub(crate) struct Marginals<'a> {
    pub row_ids: &'a [Uuid],
    pub column_ids: &'a [Uuid],
    pub row_seats: &'a [u32],
    pub column_seats: &'a [u32],
}

struct Refit<'a> {
    decisions: &'a LotDecisions,
    applied: Vec<LotDecision>,
    iteration: u32,
}

impl Refit<'_> {
    /// One-dimensional apportionment of one row or column. Ties need a lot
    /// decision keyed by the refitted axis.
    fn run(
        &mut self,
        axis: Axis,
        contender_ids: &[Uuid],
        weights: &[Ratio],
        house: u32,
    ) -> Result<(DivisorApportionment, Ratio), ApportionmentError> {
        let mut allocation = divisor::apportion(weights, house)?;

        if let Some(tie) = allocation.tie.clone() {
            let contenders = tie.contenders.iter().map(|&i| contender_ids[i]).collect();
            let context = LotDecisionContext::sub_apportionment(axis, contenders, tie.seats);

            let Some(winners) = self.decisions.winners(&context) else {
                tracing::debug!(axis = ?axis, iteration = self.iteration, "Sub-apportionment tie awaits a lot decision");
                return Err(ApportionmentError::NonConvergence {
                    iterations: self.iteration,
                    pending: vec![context],
                });
            };
            let winners: Vec<usize> = winners
                .iter()
                .filter_map(|w| contender_ids.iter().position(|id| id == w))
                .collect();
            allocation.resolve(&winners);

            if let Some(decision) = self.decisions.get(&context) {
                if !self.applied.contains(&decision) {
                    self.applied.push(decision);
                }
            }
        }

        let divisor = allocation.divisor(weights)?;
        Ok((allocation, divisor))
    }
}

/// Seat matrix whose row sums are `row_seats` and column sums are
/// `column_seats`
pub(crate) fn apportion(
    marginals: &Marginals<'_>,
    votes: &[Vec<u64>],
    max_iterations: u32,
    decisions: &LotDecisions,
) -> Result<SubApportionment, ApportionmentError> {
    let rows = marginals.row_ids.len();
    let columns = marginals.column_ids.len();

    let mut column_divisors = Vec::with_capacity(columns);
    for column in 0..columns {
        let weights: Vec<Ratio> = (0..rows).map(|row| Ratio::integer(votes[row][column])).collect();
        let allocation = divisor::apportion(&weights, marginals.column_seats[column])?;
        column_divisors.push(allocation.divisor(&weights)?);
    }
    let mut row_divisors = vec![Ratio::integer(1); rows];
    let mut seats = vec![vec![0u32; columns]; rows];

    let mut refit = Refit {
        decisions,
        applied: Vec::new(),
        iteration: 0,
    };

    for iteration in 1..=max_iterations {
        refit.iteration = iteration;

        for row in 0..rows {
            let weights = (0..columns)
                .map(|column| column_divisors[column].divide_integer(votes[row][column]))
                .collect::<Result<Vec<_>, _>>()?;
            let axis = Axis::UnionList(marginals.row_ids[row]);
            let (allocation, divisor) = refit.run(axis, marginals.column_ids, &weights, marginals.row_seats[row])?;
            seats[row] = allocation.seats;
            row_divisors[row] = divisor;
        }

        let column_sums: Vec<u32> = (0..columns).map(|c| seats.iter().map(|r| r[c]).sum()).collect();
        if column_sums == marginals.column_seats {
            return Ok(finish(seats, row_divisors, column_divisors, iteration, refit.applied));
        }

        for column in 0..columns {
            let weights = (0..rows)
                .map(|row| row_divisors[row].divide_integer(votes[row][column]))
                .collect::<Result<Vec<_>, _>>()?;
            let axis = Axis::District(marginals.column_ids[column]);
            let (allocation, divisor) =
                refit.run(axis, marginals.row_ids, &weights, marginals.column_seats[column])?;
            for (row, row_seats) in seats.iter_mut().enumerate() {
                row_seats[column] = allocation.seats[row];
            }
            column_divisors[column] = divisor;
        }

        let row_sums: Vec<u32> = seats.iter().map(|r| r.iter().sum()).collect();
        if row_sums == marginals.row_seats {
            return Ok(finish(seats, row_divisors, column_divisors, iteration, refit.applied));
        }

        tracing::debug!(iteration = iteration, "Marginals not yet matched");
    }

    Err(ApportionmentError::NonConvergence {
        iterations: max_iterations,
        pending: Vec::new(),
    })
}

fn finish(
    seats: Vec<Vec<u32>>,
    row_divisors: Vec<Ratio>,
    column_divisors: Vec<Ratio>,
    iterations: u32,
    applied: Vec<LotDecision>,
) -> SubApportionment {
    SubApportionment {
        seats,
        row_divisors,
        column_divisors,
        iterations,
        applied,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apportionment::lot_decision::LotChoice;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn test_converges_after_column_refit() {
        let (rows, columns) = (ids(3), ids(2));
        let votes = vec![vec![3244, 174], vec![574, 1355], vec![4892, 400]];
        let marginals = Marginals {
            row_ids: &rows,
            column_ids: &columns,
            row_seats: &[3, 2, 5],
            column_seats: &[6, 4],
        };

        let result = apportion(&marginals, &votes, 10, &LotDecisions::new()).unwrap();
        assert_eq!(result.seats, vec![vec![2, 1], vec![0, 2], vec![4, 1]]);
        assert_eq!(result.iterations, 2);
        assert_eq!(result.column_divisors, vec![Ratio::integer(1400), Ratio::integer(300)]);
    }

    #[test]
    fn test_row_tie_needs_a_lot_decision() {
        let (rows, columns) = (ids(2), ids(2));
        let votes = vec![vec![600, 600], vec![100, 100]];
        let marginals = Marginals {
            row_ids: &rows,
            column_ids: &columns,
            row_seats: &[3, 1],
            column_seats: &[2, 2],
        };

        let pending = match apportion(&marginals, &votes, 10, &LotDecisions::new()) {
            Err(ApportionmentError::NonConvergence { pending, .. }) => pending,
            other => panic!("expected a pending lot decision, got {:?}", other),
        };
        let first = LotDecisionContext::sub_apportionment(Axis::UnionList(rows[0]), columns.clone(), 1);
        assert_eq!(pending, vec![first.clone()]);

        let second = LotDecisionContext::sub_apportionment(Axis::UnionList(rows[1]), columns.clone(), 1);
        let decisions: LotDecisions = [
            LotDecision {
                context: first,
                choice: LotChoice::Winners(vec![columns[0]]),
            },
            LotDecision {
                context: second,
                choice: LotChoice::Winners(vec![columns[1]]),
            },
        ]
        .into_iter()
        .collect();

        let result = apportion(&marginals, &votes, 10, &decisions).unwrap();
        assert_eq!(result.seats, vec![vec![2, 1], vec![0, 1]]);
        assert_eq!(result.applied.len(), 2);
    }

    #[test]
    fn test_iteration_bound_is_reported() {
        let (rows, columns) = (ids(3), ids(2));
        let votes = vec![vec![3244, 174], vec![574, 1355], vec![4892, 400]];
        let marginals = Marginals {
            row_ids: &rows,
            column_ids: &columns,
            row_seats: &[3, 2, 5],
            column_seats: &[6, 4],
        };

        assert!(matches!(
            apportion(&marginals, &votes, 1, &LotDecisions::new()),
            Err(ApportionmentError::NonConvergence { iterations: 1, .. })
        ));
    }
}
