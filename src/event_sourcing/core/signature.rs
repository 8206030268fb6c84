// ============================================================================
// Business Event Signatures
// ============================================================================
//
// Key issuance and HSM access live outside this crate. The store only asks
// for a signature over the bytes it is about to persist and, when a public
// key is configured, verifies it again on load.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("signing failed: {0}")]
    SigningFailed(String),
}

pub trait SignatureService: Send + Sync {
    fn attach_signature(&self, payload: &[u8]) -> Result<Vec<u8>, SignatureError>;

    fn verify_signature(&self, payload: &[u8], signature: &[u8], public_key: &[u8]) -> bool;

    /// Key used to verify stored events on load; `None` disables verification
    fn public_key(&self) -> Option<Vec<u8>>;
}

/// Used when business-event signing is not configured
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsignedEvents;

impl SignatureService for UnsignedEvents {
    fn attach_signature(&self, _payload: &[u8]) -> Result<Vec<u8>, SignatureError> {
        Ok(Vec::new())
    }

    fn verify_signature(&self, _payload: &[u8], _signature: &[u8], _public_key: &[u8]) -> bool {
        true
    }

    fn public_key(&self) -> Option<Vec<u8>> {
        None
    }
}
