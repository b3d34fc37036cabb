// crates/corvusforge-waivers/src/lib.rs
// ============================================================================
// Crate: corvusforge-waivers
// Description: Waiver Manager: registers signed gate-bypass artifacts and
// answers whether a given scope currently has a valid waiver.
// Purpose: Let an operator authorize a bounded, auditable bypass of a failed
// gate without weakening the ledger's integrity guarantees.
// Dependencies: corvusforge-core, corvusforge-crypto, corvusforge-store
// ============================================================================

//! # corvusforge-waivers
//!
//! A [`WaiverManager`] registers [`WaiverArtifact`](corvusforge_core::WaiverArtifact)
//! values, verifying their signature via the crypto provider chain and storing
//! them content-addressed through an [`ArtifactStoreApi`](corvusforge_core::ArtifactStoreApi).
//! Strict mode is fixed at construction: in strict mode an unverifiable
//! signature is rejected outright rather than stored with `signature_verified
//! = false`.

mod manager;

pub use manager::RegisteredWaiver;
pub use manager::WaiverError;
pub use manager::WaiverManager;
pub use manager::WaiverMode;
