use std::collections::HashSet;

use uuid::Uuid;

/// Oracle answering whether a domain of influence may see partial results.
/// The permission tree behind the answer is computed elsewhere.
pub trait PartialResultVisibility: Send + Sync {
    fn may_view_partial(&self, domain_of_influence_id: Uuid) -> bool;
}

impl<F> PartialResultVisibility for F
where
    F: Fn(Uuid) -> bool + Send + Sync,
{
    fn may_view_partial(&self, domain_of_influence_id: Uuid) -> bool {
        self(domain_of_influence_id)
    }
}

/// Fixed set of domains of influence flagged for partial results
#[derive(Debug, Default, Clone)]
pub struct FlaggedDomainsOfInfluence(HashSet<Uuid>);

impl FlaggedDomainsOfInfluence {
    pub fn new(ids: impl IntoIterator<Item = Uuid>) -> Self {
        Self(ids.into_iter().collect())
    }
}

impl PartialResultVisibility for FlaggedDomainsOfInfluence {
    fn may_view_partial(&self, domain_of_influence_id: Uuid) -> bool {
        self.0.contains(&domain_of_influence_id)
    }
}
