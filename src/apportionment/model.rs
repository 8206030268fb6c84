use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::lot_decision::{LotDecision, LotDecisionContext, LotDecisions};
use crate::domain::end_result::CandidateVotes;
use crate::domain::shared::QuorumConfig;

// ============================================================================
// Apportionment Input
// ============================================================================

/// One electoral district (a proportional election of the union)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistrictInput {
    pub id: Uuid,
    pub seats: u32,
}

/// The list a union list fields in one district
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellInput {
    pub list_id: Uuid,
    pub votes: u64,
    /// In list order
    pub candidates: Vec<CandidateVotes>,
}

/// A union list (or, for a standalone election, a list)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowInput {
    pub id: Uuid,
    /// Keyed by district id; districts without a list are absent
    pub cells: BTreeMap<Uuid, CellInput>,
}

#[derive(Debug, Clone)]
pub struct ApportionmentInput {
    pub subject_id: Uuid,
    pub districts: Vec<DistrictInput>,
    pub rows: Vec<RowInput>,
    pub quorum: QuorumConfig,
    pub max_iterations: u32,
    pub lot_decisions: LotDecisions,
}

impl ApportionmentInput {
    pub fn total_seats(&self) -> u32 {
        self.districts.iter().map(|d| d.seats).sum()
    }
}

// ============================================================================
// Apportionment Result
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApportionmentStatus {
    Complete,
    PendingLotDecisions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumOutcome {
    pub union_list_id: Uuid,
    pub passed: bool,
    pub district_share_met: bool,
    pub total_share_met: bool,
    pub min_seats_met: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowApportionment {
    pub union_list_id: Uuid,
    pub voter_number: u64,
    pub seats: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatCell {
    pub union_list_id: Uuid,
    pub district_id: Uuid,
    pub list_id: Option<Uuid>,
    pub votes: u64,
    pub seats: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRank {
    pub candidate_id: Uuid,
    pub votes: u64,
    pub rank: u32,
    pub elected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMandates {
    pub list_id: Uuid,
    pub seats: u32,
    pub candidates: Vec<CandidateRank>,
    pub elected: Vec<Uuid>,
    /// Non-elected candidates in rank order
    pub substitutes: Vec<Uuid>,
    /// A tie straddles the last seat and no lot decided it
    pub pending: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApportionmentResult {
    pub subject_id: Uuid,
    pub status: ApportionmentStatus,
    pub quorum: Vec<QuorumOutcome>,
    pub super_apportionment: Vec<RowApportionment>,
    pub union_divisor: Option<Decimal>,
    /// Empty while the super-apportionment waits for a lot decision
    pub seats: Vec<SeatCell>,
    pub row_divisors: BTreeMap<Uuid, Decimal>,
    pub column_divisors: BTreeMap<Uuid, Decimal>,
    pub iterations: u32,
    pub mandates: Vec<ListMandates>,
    pub applied_lot_decisions: Vec<LotDecision>,
    pub pending_lot_decisions: Vec<LotDecisionContext>,
}

impl ApportionmentResult {
    pub fn seats_of(&self, union_list_id: Uuid, district_id: Uuid) -> u32 {
        self.seats
            .iter()
            .find(|c| c.union_list_id == union_list_id && c.district_id == district_id)
            .map_or(0, |c| c.seats)
    }

    pub fn row_sum(&self, union_list_id: Uuid) -> u32 {
        self.seats
            .iter()
            .filter(|c| c.union_list_id == union_list_id)
            .map(|c| c.seats)
            .sum()
    }

    pub fn column_sum(&self, district_id: Uuid) -> u32 {
        self.seats
            .iter()
            .filter(|c| c.district_id == district_id)
            .map(|c| c.seats)
            .sum()
    }

    pub fn mandates_of(&self, list_id: Uuid) -> Option<&ListMandates> {
        self.mandates.iter().find(|m| m.list_id == list_id)
    }
}
