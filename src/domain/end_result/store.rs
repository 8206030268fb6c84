use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use super::errors::EndResultError;
use super::model::EndResult;

// ============================================================================
// End Result Store - versioned working state
// ============================================================================
//
// Writers read, modify and write back under a compare-and-set on the
// version. A stale write fails with `VersionConflict` and the caller redoes
// the whole read-modify-write.
//
// ============================================================================

#[async_trait]
pub trait EndResultStore: Send + Sync {
    async fn get(&self, political_business_id: Uuid) -> Result<Option<EndResult>, EndResultError>;

    /// Writes iff the stored version equals `expected_version` (0 = absent).
    /// Returns the new version.
    async fn put(&self, end_result: EndResult, expected_version: u64) -> Result<u64, EndResultError>;
}

#[derive(Default)]
pub struct InMemoryEndResultStore {
    results: DashMap<Uuid, EndResult>,
}

impl InMemoryEndResultStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EndResultStore for InMemoryEndResultStore {
    async fn get(&self, political_business_id: Uuid) -> Result<Option<EndResult>, EndResultError> {
        Ok(self.results.get(&political_business_id).map(|r| r.value().clone()))
    }

    async fn put(&self, mut end_result: EndResult, expected_version: u64) -> Result<u64, EndResultError> {
        let political_business_id = end_result.political_business_id;
        let actual = match self.results.entry(political_business_id) {
            Entry::Occupied(mut occupied) => {
                let actual = occupied.get().version;
                if actual == expected_version {
                    end_result.version = actual + 1;
                    occupied.insert(end_result);
                    return Ok(actual + 1);
                }
                actual
            }
            Entry::Vacant(vacant) => {
                if expected_version == 0 {
                    end_result.version = 1;
                    vacant.insert(end_result);
                    return Ok(1);
                }
                0
            }
        };

        tracing::warn!(
            political_business_id = %political_business_id,
            expected = expected_version,
            actual = actual,
            "End result version conflict"
        );
        Err(EndResultError::VersionConflict {
            political_business_id,
            expected: expected_version,
            actual,
        })
    }
}
