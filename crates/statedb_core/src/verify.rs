//! Signature verification boundary.

use ed25519_dalek::{Signature, VerifyingKey};

/// Verifies transaction signatures against sender public keys.
///
/// The engine never inspects key or signature bytes itself; it only asks
/// whether the set verifies.
pub trait SignatureVerifier: Send + Sync {
    /// Returns whether every signature verifies the message under the
    /// matching public key.
    ///
    /// Implementations must return `false` for empty or mismatched sets
    /// rather than erroring.
    fn verify(&self, public_keys: &[Vec<u8>], message: &[u8], signatures: &[Vec<u8>]) -> bool;
}

/// Ed25519 signature verifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl Ed25519Verifier {
    /// Creates a new verifier.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, public_keys: &[Vec<u8>], message: &[u8], signatures: &[Vec<u8>]) -> bool {
        if public_keys.is_empty() || public_keys.len() != signatures.len() {
            return false;
        }
        public_keys.iter().zip(signatures).all(|(key, sig)| {
            let Ok(key_bytes) = <[u8; 32]>::try_from(key.as_slice()) else {
                return false;
            };
            let Ok(verifying_key) = VerifyingKey::from_bytes(&key_bytes) else {
                return false;
            };
            let Ok(signature) = Signature::from_slice(sig) else {
                return false;
            };
            verifying_key.verify_strict(message, &signature).is_ok()
        })
    }
}
