// crates/corvusforge-crypto/src/fail_closed.rs
// ============================================================================
// Module: Fail-Closed Provider
// Description: The terminal tier of the crypto provider chain.
// Purpose: Guarantee the chain always has a selectable provider, one whose
// every operation refuses rather than silently degrading to "unsigned".
// Dependencies: corvusforge-core
// ============================================================================

//! ## Overview
//! When neither the extended nor native tiers are available, the chain
//! selects this provider. Its `verify` always returns `Ok(None)` and its
//! signing operations always return [`CryptoError::Unavailable`]; nothing
//! downstream can mistake its output for a real signature or a real
//! verification.

use corvusforge_core::CryptoError;
use corvusforge_core::CryptoProvider;
use corvusforge_core::VerifiedSignature;

/// The always-available, never-succeeds terminal provider tier.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailClosedProvider;

impl FailClosedProvider {
    /// Creates the fail-closed provider. Construction never fails.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl CryptoProvider for FailClosedProvider {
    fn name(&self) -> &'static str {
        "fail_closed"
    }

    fn is_real_provider(&self) -> bool {
        false
    }

    fn generate_keypair(&self) -> Result<(String, String), CryptoError> {
        Err(CryptoError::Unavailable("no crypto backend is available".to_string()))
    }

    fn sign(&self, _bytes: &[u8], _private_hex: &str) -> Result<String, CryptoError> {
        Err(CryptoError::Unavailable("no crypto backend is available".to_string()))
    }

    fn verify(
        &self,
        _bytes: &[u8],
        _signature_hex: &str,
        _public_hex: &str,
    ) -> Result<Option<VerifiedSignature>, CryptoError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test assertions use unwrap for brevity")]
    use super::*;

    #[test]
    fn verify_always_returns_not_verified() {
        let provider = FailClosedProvider::new();
        let result = provider.verify(b"anything", "aa", "bb").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn sign_always_refuses() {
        let provider = FailClosedProvider::new();
        assert!(provider.sign(b"anything", "aa").is_err());
    }

    #[test]
    fn is_not_a_real_provider() {
        assert!(!FailClosedProvider::new().is_real_provider());
    }
}
