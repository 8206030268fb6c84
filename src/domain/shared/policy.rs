use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value_objects::DomainOfInfluenceType;

/// Per-contest configuration consulted by the lifecycle and the aggregator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContestPolicy {
    pub contest_id: Uuid,

    /// Locked or archived contests accept no mutation at all
    #[serde(default)]
    pub locked: bool,

    /// Results entered now are flagged as testing-phase entries
    #[serde(default)]
    pub testing_phase: bool,

    #[serde(default = "default_true")]
    pub manual_publication: bool,

    #[serde(default)]
    pub publish_before_audited_tentatively: bool,

    /// DOI types whose results qualify for automatic publication
    #[serde(default)]
    pub auto_publish_domain_of_influence_types: Vec<DomainOfInfluenceType>,

    /// Deepest DOI level (root = 0) that qualifies for automatic publication
    #[serde(default)]
    pub auto_publish_max_level: Option<u32>,

    /// Canton setting: end results cannot be finalized
    #[serde(default)]
    pub end_result_finalize_disabled: bool,

    #[serde(default = "default_true")]
    pub second_factor_required: bool,

    #[serde(default)]
    pub quorum: QuorumConfig,
}

impl ContestPolicy {
    pub fn new(contest_id: Uuid) -> Self {
        Self {
            contest_id,
            locked: false,
            testing_phase: false,
            manual_publication: true,
            publish_before_audited_tentatively: false,
            auto_publish_domain_of_influence_types: Vec::new(),
            auto_publish_max_level: None,
            end_result_finalize_disabled: false,
            second_factor_required: true,
            quorum: QuorumConfig::default(),
        }
    }

    /// Whether entering `AuditedTentatively` publishes the result on its own
    pub fn publishes_automatically(&self, doi_type: DomainOfInfluenceType, doi_level: u32) -> bool {
        if !self.manual_publication {
            return true;
        }
        self.publish_before_audited_tentatively
            && self.auto_publish_domain_of_influence_types.contains(&doi_type)
            && self.auto_publish_max_level.map_or(true, |max| doi_level <= max)
    }
}

fn default_true() -> bool {
    true
}

/// Thresholds a union list must meet to take part in apportionment.
/// A list passes when it meets at least one configured criterion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuorumConfig {
    /// Share of list votes in at least one district, in percent
    #[serde(default)]
    pub district_percent: Option<Decimal>,

    /// Share of all voter numbers of the union, in percent
    #[serde(default)]
    pub total_percent: Option<Decimal>,

    /// Seats won in an apportionment without any quorum
    #[serde(default)]
    pub min_seats: Option<u32>,
}

impl QuorumConfig {
    pub fn is_unrestricted(&self) -> bool {
        self.district_percent.is_none() && self.total_percent.is_none() && self.min_seats.is_none()
    }
}
