use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use uuid::Uuid;

// ============================================================================
// Second-Factor Approval
// ============================================================================
//
// A transaction is issued and confirmed by an external service. It is bound
// to a hash of the action it approves; the hash is recomputed from current
// data right before the transition, so any change in between is detected.
// Verification is a precondition step composed in front of the transition,
// the aggregates never see tokens.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondFactorTransaction {
    pub id: String,
    /// Hex SHA-256 of the approved action, see [`action_hash`]
    pub action_id: String,
    pub verified: bool,
    pub consumed: bool,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecondFactorError {
    #[error("Second factor transaction is required for {0}")]
    Missing(String),

    #[error("Second factor transaction {0} not found")]
    NotFound(String),

    #[error("Data changed since second factor transaction {0} was issued")]
    DataChanged(String),

    #[error("Second factor transaction {0} is not verified")]
    NotVerified(String),

    #[error("Second factor transaction {0} has expired")]
    Expired(String),

    #[error("Second factor transaction {0} was already used")]
    AlreadyUsed(String),

    #[error("Action hash could not be computed: {0}")]
    Hashing(String),
}

#[async_trait]
pub trait SecondFactorVerifier: Send + Sync {
    async fn find(&self, transaction_id: &str) -> Option<SecondFactorTransaction>;

    /// Marks the transaction used; returns false if it was already used
    async fn consume(&self, transaction_id: &str) -> bool;
}

/// Hash binding a transaction to one action on one subject with one payload
pub fn action_hash<P: Serialize>(action: &str, subject_id: Uuid, payload: &P) -> Result<String, SecondFactorError> {
    let payload = serde_json::to_vec(payload).map_err(|e| SecondFactorError::Hashing(e.to_string()))?;

    let mut hasher = Sha256::new();
    hasher.update(action.as_bytes());
    hasher.update(b"|");
    hasher.update(subject_id.as_bytes());
    hasher.update(b"|");
    hasher.update(&payload);
    Ok(hex::encode(hasher.finalize()))
}

/// Checks a token against the action about to run. The token stays usable
/// until [`consume_approval`] is called once the action is persisted.
pub async fn verify_approval<'a>(
    verifier: &dyn SecondFactorVerifier,
    transaction_id: Option<&'a str>,
    action: &str,
    expected_action_id: &str,
    now: DateTime<Utc>,
) -> Result<&'a str, SecondFactorError> {
    let id = transaction_id.ok_or_else(|| SecondFactorError::Missing(action.to_string()))?;

    let transaction = verifier
        .find(id)
        .await
        .ok_or_else(|| SecondFactorError::NotFound(id.to_string()))?;

    if transaction.action_id != expected_action_id {
        return Err(SecondFactorError::DataChanged(id.to_string()));
    }
    if !transaction.verified {
        return Err(SecondFactorError::NotVerified(id.to_string()));
    }
    if transaction.expires_at <= now {
        return Err(SecondFactorError::Expired(id.to_string()));
    }
    if transaction.consumed {
        return Err(SecondFactorError::AlreadyUsed(id.to_string()));
    }

    tracing::debug!(transaction_id = %id, action = %action, "Second factor approval verified");
    Ok(id)
}

/// Marks a verified token used after its action was appended
pub async fn consume_approval(verifier: &dyn SecondFactorVerifier, transaction_id: &str) {
    if !verifier.consume(transaction_id).await {
        tracing::warn!(transaction_id = %transaction_id, "Second factor transaction was used concurrently");
    }
}

/// Transactions registered by the surrounding service once issued/confirmed
#[derive(Default)]
pub struct InMemorySecondFactorVerifier {
    transactions: Mutex<HashMap<String, SecondFactorTransaction>>,
}

impl InMemorySecondFactorVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, transaction: SecondFactorTransaction) {
        self.transactions.lock().await.insert(transaction.id.clone(), transaction);
    }
}

#[async_trait]
impl SecondFactorVerifier for InMemorySecondFactorVerifier {
    async fn find(&self, transaction_id: &str) -> Option<SecondFactorTransaction> {
        self.transactions.lock().await.get(transaction_id).cloned()
    }

    async fn consume(&self, transaction_id: &str) -> bool {
        match self.transactions.lock().await.get_mut(transaction_id) {
            Some(t) if !t.consumed => {
                t.consumed = true;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn verifier_with(action_id: &str, verified: bool, expires_in: Duration) -> InMemorySecondFactorVerifier {
        let verifier = InMemorySecondFactorVerifier::new();
        verifier
            .register(SecondFactorTransaction {
                id: "tx-1".to_string(),
                action_id: action_id.to_string(),
                verified,
                consumed: false,
                expires_at: Utc::now() + expires_in,
            })
            .await;
        verifier
    }

    #[test]
    fn test_action_hash_depends_on_payload() {
        let subject = Uuid::new_v4();
        let a = action_hash("SubmissionFinished", subject, &vec![1, 2]).unwrap();
        let b = action_hash("SubmissionFinished", subject, &vec![1, 3]).unwrap();
        let c = action_hash("CorrectionFinished", subject, &vec![1, 2]).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, action_hash("SubmissionFinished", subject, &vec![1, 2]).unwrap());
    }

    #[tokio::test]
    async fn test_missing_token() {
        let verifier = InMemorySecondFactorVerifier::new();
        let result = verify_approval(&verifier, None, "SubmissionFinished", "x", Utc::now()).await;
        assert!(matches!(result, Err(SecondFactorError::Missing(_))));
    }

    #[tokio::test]
    async fn test_data_changed() {
        let verifier = verifier_with("old-hash", true, Duration::minutes(5)).await;
        let result = verify_approval(&verifier, Some("tx-1"), "SubmissionFinished", "new-hash", Utc::now()).await;
        assert_eq!(result, Err(SecondFactorError::DataChanged("tx-1".to_string())));
    }

    #[tokio::test]
    async fn test_not_verified() {
        let verifier = verifier_with("h", false, Duration::minutes(5)).await;
        let result = verify_approval(&verifier, Some("tx-1"), "SubmissionFinished", "h", Utc::now()).await;
        assert_eq!(result, Err(SecondFactorError::NotVerified("tx-1".to_string())));
    }

    #[tokio::test]
    async fn test_expired() {
        let verifier = verifier_with("h", true, Duration::minutes(-1)).await;
        let result = verify_approval(&verifier, Some("tx-1"), "SubmissionFinished", "h", Utc::now()).await;
        assert_eq!(result, Err(SecondFactorError::Expired("tx-1".to_string())));
    }

    #[tokio::test]
    async fn test_verify_leaves_token_unused() {
        let verifier = verifier_with("h", true, Duration::minutes(5)).await;
        let id = verify_approval(&verifier, Some("tx-1"), "SubmissionFinished", "h", Utc::now())
            .await
            .unwrap();
        assert_eq!(id, "tx-1");
        assert!(!verifier.find("tx-1").await.unwrap().consumed);
        assert!(verify_approval(&verifier, Some("tx-1"), "SubmissionFinished", "h", Utc::now())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_single_use() {
        let verifier = verifier_with("h", true, Duration::minutes(5)).await;
        let id = verify_approval(&verifier, Some("tx-1"), "SubmissionFinished", "h", Utc::now())
            .await
            .unwrap();
        consume_approval(&verifier, id).await;
        let again = verify_approval(&verifier, Some("tx-1"), "SubmissionFinished", "h", Utc::now()).await;
        assert_eq!(again, Err(SecondFactorError::AlreadyUsed("tx-1".to_string())));
    }
}
