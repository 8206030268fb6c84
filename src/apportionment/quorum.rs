use rust_decimal::Decimal;

use super::model::QuorumOutcome;
use super::rational::widening_mul;
use crate::domain::shared::QuorumConfig;

/// `part / whole >= percent / 100`, decided without division
pub fn meets_percent(part: u64, whole: u64, percent: Decimal) -> bool {
    if percent <= Decimal::ZERO {
        return true;
    }
    if whole == 0 {
        return false;
    }
    let mantissa = percent.mantissa().unsigned_abs();
    let scale = 10u128.pow(percent.scale());
    widening_mul(part as u128 * 100, scale) >= widening_mul(mantissa, whole as u128)
}

/// Rows of the vote matrix as seen by the quorum
pub(crate) struct QuorumRow<'a> {
    pub id: uuid::Uuid,
    /// Votes per district, aligned with `district_totals`
    pub votes: &'a [u64],
    pub voter_number: u64,
    /// Seats in an apportionment without quorum
    pub unrestricted_seats: u32,
}

/// A row passes when it meets at least one configured criterion
pub(crate) fn evaluate(config: &QuorumConfig, rows: &[QuorumRow<'_>], district_totals: &[u64]) -> Vec<QuorumOutcome> {
    let voter_number_total: u64 = rows.iter().map(|r| r.voter_number).sum();

    rows.iter()
        .map(|row| {
            let district_share_met = config.district_percent.is_some_and(|percent| {
                row.votes
                    .iter()
                    .zip(district_totals)
                    .any(|(&votes, &total)| meets_percent(votes, total, percent))
            });
            let total_share_met = config
                .total_percent
                .is_some_and(|percent| meets_percent(row.voter_number, voter_number_total, percent));
            let min_seats_met = config.min_seats.is_some_and(|min| row.unrestricted_seats >= min);

            QuorumOutcome {
                union_list_id: row.id,
                passed: config.is_unrestricted() || district_share_met || total_share_met || min_seats_met,
                district_share_met,
                total_share_met,
                min_seats_met,
            }
        })
        .collect()
}
