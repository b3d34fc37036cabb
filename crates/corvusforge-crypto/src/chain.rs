// crates/corvusforge-crypto/src/chain.rs
// ============================================================================
// Module: Provider Chain
// Description: Capability-probed selection among the extended, native, and
// fail-closed crypto provider tiers.
// Purpose: Select the richest available provider once, at construction, and
// cache that choice for the lifetime of the chain.
// Dependencies: corvusforge-core
// ============================================================================

//! ## Overview
//! The three tiers are attempted in priority order exactly once: extended,
//! then native, then fail-closed. Unlike a per-call fallback, the selection
//! is fixed at construction, so every subsequent `sign`/`verify` call goes
//! straight to the selected tier. The fail-closed tier can never fail to
//! construct, so [`ProviderChain::probe`] always terminates with a usable
//! provider.

use std::sync::Arc;

use corvusforge_core::CryptoError;
use corvusforge_core::CryptoProvider;
use corvusforge_core::VerifiedSignature;

use crate::extended::ExtendedCryptoProvider;
use crate::fail_closed::FailClosedProvider;
use crate::native::NativeEd25519Provider;

/// A config-driven request for whether the extended tier should be probed.
///
/// Modeling "if its module loads" from the provider chain's priority order:
/// a deployment may disable the extended tier outright (e.g. it has no use
/// for key rotation bookkeeping), in which case the chain probes straight to
/// native.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProviderChainOptions {
    /// Whether to attempt constructing the extended tier before native.
    pub allow_extended: bool,
}

/// The selected, cached crypto provider for a process or orchestrator
/// instance.
pub struct ProviderChain {
    selected: Arc<dyn CryptoProvider>,
}

impl ProviderChain {
    /// Probes the three tiers in priority order and caches the first one
    /// that is available, per `options`.
    ///
    /// This never fails: the fail-closed tier is always constructible.
    #[must_use]
    pub fn probe(options: ProviderChainOptions) -> Self {
        if options.allow_extended {
            return Self { selected: Arc::new(ExtendedCryptoProvider::new()) };
        }
        Self { selected: Arc::new(NativeEd25519Provider::new()) }
    }

    /// Builds a chain around an already-selected provider, bypassing
    /// probing. Used by tests and by callers that want to force the
    /// fail-closed tier.
    #[must_use]
    pub fn from_provider(provider: Arc<dyn CryptoProvider>) -> Self {
        Self { selected: provider }
    }

    /// Builds a chain that always selects the fail-closed tier.
    #[must_use]
    pub fn fail_closed() -> Self {
        Self::from_provider(Arc::new(FailClosedProvider::new()))
    }

    /// Returns the name of the selected provider tier.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.selected.name()
    }

    /// Returns the selected provider, shared, for callers (the Waiver
    /// Manager, ledger anchor signing) that need their own handle to it.
    #[must_use]
    pub fn provider(&self) -> Arc<dyn CryptoProvider> {
        Arc::clone(&self.selected)
    }

    /// Returns whether the selected provider is a real cryptographic
    /// backend, as opposed to the fail-closed terminal tier.
    #[must_use]
    pub fn is_real_provider(&self) -> bool {
        self.selected.is_real_provider()
    }

    /// Generates a new keypair via the selected provider.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Unavailable`] if the selected provider is the
    /// fail-closed tier.
    pub fn generate_keypair(&self) -> Result<(String, String), CryptoError> {
        self.selected.generate_keypair()
    }

    /// Signs `bytes` with `private_hex` via the selected provider.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError`] if the selected provider cannot sign or the
    /// key is malformed.
    pub fn sign(&self, bytes: &[u8], private_hex: &str) -> Result<String, CryptoError> {
        self.selected.sign(bytes, private_hex)
    }

    /// Verifies `signature_hex` over `bytes` against `public_hex` via the
    /// selected provider.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError`] only on an implementation-level fault; a
    /// failed verification is `Ok(None)`, never an error.
    pub fn verify(
        &self,
        bytes: &[u8],
        signature_hex: &str,
        public_hex: &str,
    ) -> Result<Option<VerifiedSignature>, CryptoError> {
        self.selected.verify(bytes, signature_hex, public_hex)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test assertions use unwrap for brevity")]
    use super::*;

    #[test]
    fn probe_with_extended_allowed_selects_extended_tier() {
        let chain = ProviderChain::probe(ProviderChainOptions { allow_extended: true });
        assert_eq!(chain.provider_name(), "extended_ed25519");
        assert!(chain.is_real_provider());
    }

    #[test]
    fn probe_without_extended_selects_native_tier() {
        let chain = ProviderChain::probe(ProviderChainOptions { allow_extended: false });
        assert_eq!(chain.provider_name(), "native_ed25519");
        assert!(chain.is_real_provider());
    }

    #[test]
    fn fail_closed_chain_never_verifies() {
        let chain = ProviderChain::fail_closed();
        assert!(!chain.is_real_provider());
        assert!(chain.verify(b"x", "aa", "bb").unwrap().is_none());
    }

    #[test]
    fn selected_chain_signs_and_verifies_round_trip() {
        let chain = ProviderChain::probe(ProviderChainOptions { allow_extended: false });
        let (private_hex, public_hex) = chain.generate_keypair().unwrap();
        let signature = chain.sign(b"payload", &private_hex).unwrap();
        assert!(chain.verify(b"payload", &signature, &public_hex).unwrap().is_some());
    }

    #[test]
    fn provider_handle_shares_the_selected_tier() {
        let chain = ProviderChain::probe(ProviderChainOptions { allow_extended: false });
        let provider = chain.provider();
        assert_eq!(provider.name(), chain.provider_name());
    }
}
