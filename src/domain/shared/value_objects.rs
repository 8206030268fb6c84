use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Shared Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoliticalBusinessType {
    Vote,
    MajorityElection,
    ProportionalElection,
}

impl fmt::Display for PoliticalBusinessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PoliticalBusinessType::Vote => "vote",
            PoliticalBusinessType::MajorityElection => "majority election",
            PoliticalBusinessType::ProportionalElection => "proportional election",
        };
        f.write_str(name)
    }
}

/// Administrative level of a domain of influence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DomainOfInfluenceType {
    /// Federation
    Ch,
    /// Canton
    Ct,
    /// District
    Bz,
    /// Municipality
    Mu,
    /// City district
    Sk,
    /// School community
    Sc,
    /// Church community
    Ki,
    /// Civic community
    Og,
    /// Corporation
    Ko,
    /// Other
    An,
}
