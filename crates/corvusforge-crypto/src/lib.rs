// crates/corvusforge-crypto/src/lib.rs
// ============================================================================
// Crate: corvusforge-crypto
// Description: The crypto provider chain, key fingerprinting, trust-context
// computation, and pin hashing.
// Purpose: Give the Run Ledger, Waiver Manager, and Production Guard a single
// fail-closed signing/verification surface, independent of which backend is
// actually available at runtime.
// ============================================================================

//! # corvusforge-crypto
//!
//! Implements `corvusforge_core::CryptoProvider` across three tiers, probed
//! once and cached by [`ProviderChain::probe`]: an extended provider, a
//! native Ed25519 provider, and a fail-closed terminal provider. Exposes
//! [`verify_data`], [`key_fingerprint`], [`compute_trust_context`], and
//! [`hash_pin`] as the stable surface the rest of the system calls.

mod chain;
mod extended;
mod fail_closed;
mod fingerprint;
mod native;

pub use chain::ProviderChain;
pub use extended::ExtendedCryptoProvider;
pub use fail_closed::FailClosedProvider;
pub use fingerprint::compute_trust_context;
pub use fingerprint::hash_pin;
pub use fingerprint::key_fingerprint;
pub use fingerprint::verify_data;
pub use native::NativeEd25519Provider;
