use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::policy::ContestPolicy;
use super::value_objects::{DomainOfInfluenceType, PoliticalBusinessType};

// ============================================================================
// Political Business Catalog - contest setup consumed by the engine
// ============================================================================
//
// Contest setup (domains of influence, counting circles, businesses, lists,
// unions) is administered elsewhere. The engine only reads it.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainOfInfluence {
    pub id: Uuid,
    pub name: String,
    pub doi_type: DomainOfInfluenceType,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountingCircle {
    pub id: Uuid,
    pub name: String,
    /// Lowest domain of influence the circle reports into
    pub domain_of_influence_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallotDefinition {
    pub id: Uuid,
    pub question_count: u32,
    pub tie_break_question_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListDefinition {
    pub id: Uuid,
    pub order_number: String,
    pub candidate_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BusinessDefinition {
    Vote {
        ballots: Vec<BallotDefinition>,
    },
    MajorityElection {
        number_of_mandates: u32,
        candidate_ids: Vec<Uuid>,
    },
    ProportionalElection {
        number_of_mandates: u32,
        lists: Vec<ListDefinition>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoliticalBusiness {
    pub id: Uuid,
    pub contest_id: Uuid,
    pub domain_of_influence_id: Uuid,
    pub counting_circle_ids: Vec<Uuid>,
    pub definition: BusinessDefinition,
}

impl PoliticalBusiness {
    pub fn business_type(&self) -> PoliticalBusinessType {
        match self.definition {
            BusinessDefinition::Vote { .. } => PoliticalBusinessType::Vote,
            BusinessDefinition::MajorityElection { .. } => PoliticalBusinessType::MajorityElection,
            BusinessDefinition::ProportionalElection { .. } => PoliticalBusinessType::ProportionalElection,
        }
    }

    pub fn number_of_mandates(&self) -> u32 {
        match self.definition {
            BusinessDefinition::Vote { .. } => 0,
            BusinessDefinition::MajorityElection { number_of_mandates, .. }
            | BusinessDefinition::ProportionalElection { number_of_mandates, .. } => number_of_mandates,
        }
    }

    pub fn lists(&self) -> &[ListDefinition] {
        match &self.definition {
            BusinessDefinition::ProportionalElection { lists, .. } => lists,
            _ => &[],
        }
    }
}

/// Lists of several proportional elections grouped for apportionment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnionList {
    pub id: Uuid,
    pub short_description: String,
    /// At most one list per election of the union
    pub list_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProportionalElectionUnion {
    pub id: Uuid,
    pub contest_id: Uuid,
    pub election_ids: Vec<Uuid>,
    pub union_lists: Vec<UnionList>,
}

pub trait PoliticalBusinessCatalog: Send + Sync {
    fn political_business(&self, id: Uuid) -> Option<PoliticalBusiness>;

    fn domain_of_influence(&self, id: Uuid) -> Option<DomainOfInfluence>;

    fn counting_circle(&self, id: Uuid) -> Option<CountingCircle>;

    fn contest_policy(&self, contest_id: Uuid) -> Option<ContestPolicy>;

    fn proportional_election_union(&self, id: Uuid) -> Option<ProportionalElectionUnion>;

    /// The DOI itself followed by its parents up to the root
    fn domain_of_influence_path(&self, id: Uuid) -> Vec<DomainOfInfluence> {
        let mut path = Vec::new();
        let mut next = Some(id);
        while let Some(current) = next {
            // A malformed tree must not loop forever
            if path.iter().any(|d: &DomainOfInfluence| d.id == current) {
                break;
            }
            match self.domain_of_influence(current) {
                Some(doi) => {
                    next = doi.parent_id;
                    path.push(doi);
                }
                None => break,
            }
        }
        path
    }

    /// Root = 0
    fn domain_of_influence_level(&self, id: Uuid) -> u32 {
        self.domain_of_influence_path(id).len().saturating_sub(1) as u32
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryCatalog {
    businesses: HashMap<Uuid, PoliticalBusiness>,
    domains: HashMap<Uuid, DomainOfInfluence>,
    circles: HashMap<Uuid, CountingCircle>,
    policies: HashMap<Uuid, ContestPolicy>,
    unions: HashMap<Uuid, ProportionalElectionUnion>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_domain_of_influence(mut self, doi: DomainOfInfluence) -> Self {
        self.domains.insert(doi.id, doi);
        self
    }

    pub fn with_counting_circle(mut self, circle: CountingCircle) -> Self {
        self.circles.insert(circle.id, circle);
        self
    }

    pub fn with_political_business(mut self, business: PoliticalBusiness) -> Self {
        self.businesses.insert(business.id, business);
        self
    }

    pub fn with_contest_policy(mut self, policy: ContestPolicy) -> Self {
        self.policies.insert(policy.contest_id, policy);
        self
    }

    pub fn with_union(mut self, union: ProportionalElectionUnion) -> Self {
        self.unions.insert(union.id, union);
        self
    }
}

impl PoliticalBusinessCatalog for InMemoryCatalog {
    fn political_business(&self, id: Uuid) -> Option<PoliticalBusiness> {
        self.businesses.get(&id).cloned()
    }

    fn domain_of_influence(&self, id: Uuid) -> Option<DomainOfInfluence> {
        self.domains.get(&id).cloned()
    }

    fn counting_circle(&self, id: Uuid) -> Option<CountingCircle> {
        self.circles.get(&id).cloned()
    }

    fn contest_policy(&self, contest_id: Uuid) -> Option<ContestPolicy> {
        self.policies.get(&contest_id).cloned()
    }

    fn proportional_election_union(&self, id: Uuid) -> Option<ProportionalElectionUnion> {
        self.unions.get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doi(name: &str, doi_type: DomainOfInfluenceType, parent_id: Option<Uuid>) -> DomainOfInfluence {
        DomainOfInfluence {
            id: Uuid::new_v4(),
            name: name.to_string(),
            doi_type,
            parent_id,
        }
    }

    #[test]
    fn test_path_and_level() {
        let canton = doi("Zürich", DomainOfInfluenceType::Ct, None);
        let district = doi("Winterthur", DomainOfInfluenceType::Bz, Some(canton.id));
        let municipality = doi("Seuzach", DomainOfInfluenceType::Mu, Some(district.id));

        let catalog = InMemoryCatalog::new()
            .with_domain_of_influence(canton.clone())
            .with_domain_of_influence(district.clone())
            .with_domain_of_influence(municipality.clone());

        let path: Vec<Uuid> = catalog
            .domain_of_influence_path(municipality.id)
            .iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(path, vec![municipality.id, district.id, canton.id]);
        assert_eq!(catalog.domain_of_influence_level(canton.id), 0);
        assert_eq!(catalog.domain_of_influence_level(municipality.id), 2);
    }

    #[test]
    fn test_cyclic_tree_terminates() {
        let a_id = Uuid::new_v4();
        let b = doi("b", DomainOfInfluenceType::Bz, Some(a_id));
        let a = DomainOfInfluence {
            id: a_id,
            name: "a".into(),
            doi_type: DomainOfInfluenceType::Ct,
            parent_id: Some(b.id),
        };
        let catalog = InMemoryCatalog::new()
            .with_domain_of_influence(a)
            .with_domain_of_influence(b.clone());
        assert_eq!(catalog.domain_of_influence_path(b.id).len(), 2);
    }
}
