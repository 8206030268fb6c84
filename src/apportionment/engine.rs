use std::collections::BTreeMap;

use uuid::Uuid;

use super::candidates;
use super::divisor;
use super::errors::ApportionmentError;
use super::model::*;
use super::quorum::{self, QuorumRow};
use super::rational::Ratio;
use super::sub_apportionment::{self, Marginals};
use super::super_apportionment::{self, voter_number};

// ============================================================================
// Biproportional Apportionment Engine
// ============================================================================
//
// Pure and deterministic: the same input, lot decisions included, always
// gives the same result. Phases run in order and a later phase only starts
// once the earlier one is fully determined:
//
// 1. Quorum filtering
// 2. Super-apportionment of all seats to union lists
// 3. Sub-apportionment of union-list seats to districts
// 4. Candidate mandates per list
//
// ============================================================================

pub fn apportion(input: &ApportionmentInput) -> Result<ApportionmentResult, ApportionmentError> {
    let district_ids: Vec<Uuid> = input.districts.iter().map(|d| d.id).collect();
    let district_seats: Vec<u32> = input.districts.iter().map(|d| d.seats).collect();

    for row in &input.rows {
        if let Some(unknown) = row.cells.keys().find(|d| !district_ids.contains(*d)) {
            return Err(ApportionmentError::UnknownDistrict {
                union_list_id: row.id,
                district_id: *unknown,
            });
        }
    }

    let votes: Vec<Vec<u64>> = input
        .rows
        .iter()
        .map(|row| {
            district_ids
                .iter()
                .map(|d| row.cells.get(d).map_or(0, |cell| cell.votes))
                .collect()
        })
        .collect();
    let voter_numbers: Vec<u64> = votes
        .iter()
        .map(|row| row.iter().zip(&district_seats).map(|(&v, &s)| voter_number(v, s)).sum())
        .collect();
    let house = input.total_seats();

    // 1. Quorum
    let quorum = if input.quorum.is_unrestricted() {
        quorum::evaluate(&input.quorum, &quorum_rows(input, &votes, &voter_numbers, &[]), &[])
    } else {
        let weights: Vec<Ratio> = voter_numbers.iter().map(|&v| Ratio::integer(v)).collect();
        let unrestricted = divisor::apportion(&weights, house)?;
        let district_totals: Vec<u64> = (0..district_ids.len()).map(|d| votes.iter().map(|r| r[d]).sum()).collect();
        let rows = quorum_rows(input, &votes, &voter_numbers, &unrestricted.seats);
        quorum::evaluate(&input.quorum, &rows, &district_totals)
    };

    let eligible: Vec<usize> = (0..input.rows.len()).filter(|&r| quorum[r].passed).collect();
    if eligible.is_empty() {
        return Err(ApportionmentError::NoListPassedQuorum);
    }
    for (d, district) in input.districts.iter().enumerate() {
        if district.seats > 0 && eligible.iter().all(|&r| votes[r][d] == 0) {
            return Err(ApportionmentError::DistrictWithoutVotes(district.id));
        }
    }
    tracing::debug!(
        subject_id = %input.subject_id,
        eligible = eligible.len(),
        rows = input.rows.len(),
        "Quorum evaluated"
    );

    // 2. Super-apportionment
    let eligible_ids: Vec<Uuid> = eligible.iter().map(|&r| input.rows[r].id).collect();
    let eligible_voter_numbers: Vec<u64> = eligible.iter().map(|&r| voter_numbers[r]).collect();
    let upper = super_apportionment::apportion(&eligible_ids, &eligible_voter_numbers, house, &input.lot_decisions)?;

    let mut row_seats = vec![0u32; input.rows.len()];
    for (&r, &seats) in eligible.iter().zip(&upper.seats) {
        row_seats[r] = seats;
    }
    let super_rows: Vec<RowApportionment> = input
        .rows
        .iter()
        .enumerate()
        .map(|(r, row)| RowApportionment {
            union_list_id: row.id,
            voter_number: voter_numbers[r],
            seats: row_seats[r],
        })
        .collect();

    let mut result = ApportionmentResult {
        subject_id: input.subject_id,
        status: ApportionmentStatus::Complete,
        quorum,
        super_apportionment: super_rows,
        union_divisor: upper.divisor.map(|d| d.to_decimal()).transpose()?,
        seats: Vec::new(),
        row_divisors: BTreeMap::new(),
        column_divisors: BTreeMap::new(),
        iterations: 0,
        mandates: Vec::new(),
        applied_lot_decisions: upper.applied.into_iter().collect(),
        pending_lot_decisions: Vec::new(),
    };

    if let Some(pending) = upper.pending {
        result.status = ApportionmentStatus::PendingLotDecisions;
        result.pending_lot_decisions.push(pending);
        return Ok(result);
    }

    // 3. Sub-apportionment
    let eligible_votes: Vec<Vec<u64>> = eligible.iter().map(|&r| votes[r].clone()).collect();
    let marginals = Marginals {
        row_ids: &eligible_ids,
        column_ids: &district_ids,
        row_seats: &upper.seats,
        column_seats: &district_seats,
    };
    let lower = sub_apportionment::apportion(&marginals, &eligible_votes, input.max_iterations, &input.lot_decisions)?;

    let mut matrix = vec![vec![0u32; district_ids.len()]; input.rows.len()];
    for (i, &r) in eligible.iter().enumerate() {
        matrix[r] = lower.seats[i].clone();
        result
            .row_divisors
            .insert(input.rows[r].id, lower.row_divisors[i].to_decimal()?);
    }
    for (d, divisor) in lower.column_divisors.iter().enumerate() {
        result.column_divisors.insert(district_ids[d], divisor.to_decimal()?);
    }
    result.iterations = lower.iterations;
    result.applied_lot_decisions.extend(lower.applied);

    for (r, row) in input.rows.iter().enumerate() {
        for (d, &district_id) in district_ids.iter().enumerate() {
            let cell = row.cells.get(&district_id);
            if cell.is_none() && matrix[r][d] == 0 {
                continue;
            }
            result.seats.push(SeatCell {
                union_list_id: row.id,
                district_id,
                list_id: cell.map(|c| c.list_id),
                votes: votes[r][d],
                seats: matrix[r][d],
            });
        }
    }

    // 4. Candidate mandates
    for (r, row) in input.rows.iter().enumerate() {
        for (d, district_id) in district_ids.iter().enumerate() {
            let Some(cell) = row.cells.get(district_id) else {
                continue;
            };
            let assignment = candidates::assign(cell.list_id, matrix[r][d], &cell.candidates, &input.lot_decisions);
            result.applied_lot_decisions.extend(assignment.applied);
            result.pending_lot_decisions.extend(assignment.pending);
            result.mandates.push(assignment.mandates);
        }
    }

    if !result.pending_lot_decisions.is_empty() {
        result.status = ApportionmentStatus::PendingLotDecisions;
    }

    tracing::debug!(
        subject_id = %input.subject_id,
        iterations = result.iterations,
        status = ?result.status,
        "Apportionment computed"
    );
    Ok(result)
}

fn quorum_rows<'a>(
    input: &ApportionmentInput,
    votes: &'a [Vec<u64>],
    voter_numbers: &[u64],
    unrestricted_seats: &[u32],
) -> Vec<QuorumRow<'a>> {
    input
        .rows
        .iter()
        .enumerate()
        .map(|(r, row)| QuorumRow {
            id: row.id,
            votes: &votes[r],
            voter_number: voter_numbers[r],
            unrestricted_seats: unrestricted_seats.get(r).copied().unwrap_or(0),
        })
        .collect()
}
