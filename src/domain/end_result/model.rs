use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::EndResultError;
use super::reduction::{reduce, EndResultTotals};
use crate::domain::result::ResultSnapshot;
use crate::domain::shared::{PoliticalBusiness, PoliticalBusinessType};

// ============================================================================
// End Result - working state of one political business
// ============================================================================

/// Snapshot of one done counting circle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    pub counting_circle_id: Uuid,
    /// Domains of influence between the circle and the business, lowest first
    pub intermediate_domains_of_influence: Vec<Uuid>,
    pub snapshot: ResultSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndResult {
    pub political_business_id: Uuid,
    pub business_type: PoliticalBusinessType,
    pub domain_of_influence_id: Uuid,
    /// Store version, 0 before the first write
    pub version: u64,
    pub total_count_of_counting_circles: u32,
    pub finalized: bool,
    pub contributions: BTreeMap<Uuid, Contribution>,
    pub totals: EndResultTotals,
}

impl EndResult {
    pub fn new(business: &PoliticalBusiness) -> Self {
        Self {
            political_business_id: business.id,
            business_type: business.business_type(),
            domain_of_influence_id: business.domain_of_influence_id,
            version: 0,
            total_count_of_counting_circles: business.counting_circle_ids.len() as u32,
            finalized: false,
            contributions: BTreeMap::new(),
            totals: EndResultTotals::empty(business),
        }
    }

    pub fn count_of_done_counting_circles(&self) -> u32 {
        self.contributions.len() as u32
    }

    pub fn is_complete(&self) -> bool {
        self.count_of_done_counting_circles() == self.total_count_of_counting_circles
    }

    /// Adds or replaces a circle's snapshot and recomputes the totals.
    /// Nothing changes when the new totals do not fit.
    pub fn upsert_contribution(&mut self, contribution: Contribution, business: &PoliticalBusiness) -> Result<(), EndResultError> {
        let previous = self.contributions.insert(contribution.counting_circle_id, contribution.clone());
        if let Err(e) = self.recompute(business) {
            match previous {
                Some(previous) => self.contributions.insert(contribution.counting_circle_id, previous),
                None => self.contributions.remove(&contribution.counting_circle_id),
            };
            return Err(e);
        }
        Ok(())
    }

    /// Returns false when the circle did not contribute
    pub fn remove_contribution(&mut self, counting_circle_id: Uuid, business: &PoliticalBusiness) -> Result<bool, EndResultError> {
        let removed = self.contributions.remove(&counting_circle_id).is_some();
        if removed {
            self.recompute(business)?;
        }
        Ok(removed)
    }

    pub fn recompute(&mut self, business: &PoliticalBusiness) -> Result<(), EndResultError> {
        self.totals = reduce(business, self.contributions.values().map(|c| &c.snapshot))?;
        self.total_count_of_counting_circles = business.counting_circle_ids.len() as u32;
        Ok(())
    }

    /// Totals over the circles below one intermediate domain of influence
    pub fn partial_totals(&self, domain_of_influence_id: Uuid, business: &PoliticalBusiness) -> Result<EndResultTotals, EndResultError> {
        reduce(
            business,
            self.contributions
                .values()
                .filter(|c| c.intermediate_domains_of_influence.contains(&domain_of_influence_id))
                .map(|c| &c.snapshot),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewScope {
    Partial { domain_of_influence_id: Uuid },
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndResultView {
    pub political_business_id: Uuid,
    pub domain_of_influence_id: Uuid,
    pub partial: bool,
    pub count_of_done_counting_circles: u32,
    pub total_count_of_counting_circles: u32,
    pub finalized: bool,
    pub totals: EndResultTotals,
}
