// crates/corvusforge-waivers/src/manager.rs
// ============================================================================
// Module: Waiver Manager
// Description: Registration and scope lookup for signed gate-bypass waivers.
// Purpose: Let an operator authorize bypassing a failed gate for a bounded,
// auditable window without ever promoting an unverifiable signature to
// "verified".
// Dependencies: corvusforge-core, corvusforge-crypto
// ============================================================================

//! ## Overview
//! [`WaiverManager::register_waiver`] verifies a waiver's signature through
//! the crypto provider chain, then stores the waiver content-addressed
//! through the configured [`ArtifactStoreApi`]. Strict mode is fixed at
//! construction: in strict mode a waiver whose signature does not verify is
//! rejected rather than stored with `signature_verified = false`.

use std::sync::Arc;
use std::sync::Mutex;

use corvusforge_core::ArtifactError;
use corvusforge_core::ArtifactStoreApi;
use corvusforge_core::ContentAddress;
use corvusforge_core::CryptoProvider;
use corvusforge_core::HashError;
use corvusforge_core::Timestamp;
use corvusforge_core::WaiverArtifact;
use corvusforge_core::WaiverScope;
use corvusforge_core::hash_canonical_json;
use thiserror::Error;

/// Whether an unverifiable waiver signature is rejected outright (`Strict`)
/// or stored with `signature_verified = false` (`Permissive`).
///
/// Fixed at construction; the Production Guard forces `Strict` in production
/// environments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaiverMode {
    /// An unverifiable signature is a registration error.
    Strict,
    /// An unverifiable signature is stored with `signature_verified = false`.
    Permissive,
}

/// Errors raised while registering or looking up a waiver.
#[derive(Debug, Error)]
pub enum WaiverError {
    /// The waiver's signature failed verification in strict mode.
    #[error("waiver signature did not verify for waiver {0}")]
    SignatureInvalid(String),
    /// The waiver could not be canonicalized for signing or storage.
    #[error("failed to canonicalize waiver: {0}")]
    Hashing(#[from] HashError),
    /// The waiver could not be stored.
    #[error("waiver storage error: {0}")]
    Storage(#[from] ArtifactError),
}

/// A waiver together with the content address it was stored under.
#[derive(Debug, Clone)]
pub struct RegisteredWaiver {
    /// The finalized waiver record, with `signature_verified` set.
    pub waiver: WaiverArtifact,
    /// Content address the waiver was stored under in the artifact store.
    pub content_address: ContentAddress,
}

/// The subset of a waiver's fields hashed to derive its storage address:
/// every field except `signature_verified`, which is manager-computed state
/// rather than part of the signed artifact.
#[derive(serde::Serialize)]
struct WaiverStorageView<'a> {
    waiver_id: &'a corvusforge_core::WaiverId,
    scope: &'a WaiverScope,
    justification: &'a str,
    approving_identity: &'a str,
    signature: &'a str,
    issued_at: Timestamp,
    expires_at: Timestamp,
}

/// Registers and looks up signed gate-bypass waivers (spec §4.5).
pub struct WaiverManager {
    mode: WaiverMode,
    provider: Arc<dyn CryptoProvider>,
    artifact_store: Arc<dyn ArtifactStoreApi>,
    registered: Mutex<Vec<RegisteredWaiver>>,
}

impl WaiverManager {
    /// Creates a waiver manager with a fixed mode, crypto provider, and
    /// artifact store.
    #[must_use]
    pub fn new(
        mode: WaiverMode,
        provider: Arc<dyn CryptoProvider>,
        artifact_store: Arc<dyn ArtifactStoreApi>,
    ) -> Self {
        Self { mode, provider, artifact_store, registered: Mutex::new(Vec::new()) }
    }

    /// Returns this manager's fixed mode.
    #[must_use]
    pub const fn mode(&self) -> WaiverMode {
        self.mode
    }

    /// Verifies `waiver`'s signature, finalizes `signature_verified`, and
    /// stores it content-addressed.
    ///
    /// # Errors
    ///
    /// Returns [`WaiverError::SignatureInvalid`] in strict mode when the
    /// signature does not verify (or no real crypto provider is selected),
    /// or [`WaiverError::Storage`]/[`WaiverError::Hashing`] on an underlying
    /// failure.
    pub fn register_waiver(
        &self,
        mut waiver: WaiverArtifact,
    ) -> Result<RegisteredWaiver, WaiverError> {
        let signed_bytes = corvusforge_core::canonical_bytes(&signable(&waiver))?;
        let verified = self.provider.is_real_provider()
            && corvusforge_crypto::verify_data(
                self.provider.as_ref(),
                &signed_bytes,
                &waiver.signature,
                &waiver.approving_identity,
            );

        if !verified && self.mode == WaiverMode::Strict {
            return Err(WaiverError::SignatureInvalid(waiver.waiver_id.as_str().to_string()));
        }
        waiver.signature_verified = verified;

        let storage_view = WaiverStorageView {
            waiver_id: &waiver.waiver_id,
            scope: &waiver.scope,
            justification: &waiver.justification,
            approving_identity: &waiver.approving_identity,
            signature: &waiver.signature,
            issued_at: waiver.issued_at,
            expires_at: waiver.expires_at,
        };
        let bytes = corvusforge_core::canonical_bytes(&storage_view)?;
        let content_address = self.artifact_store.put(&bytes, "application/vnd.corvusforge.waiver+json")?;

        let registered = RegisteredWaiver { waiver, content_address };
        self.registered
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(registered.clone());
        Ok(registered)
    }

    /// Returns `true` iff a registered waiver covers `scope`, has not
    /// expired as of `now`, and (in strict mode) verified its signature.
    #[must_use]
    pub fn has_valid_waiver(&self, scope: &WaiverScope, now: Timestamp) -> bool {
        self.find_valid_waiver(scope, now).is_some()
    }

    /// Returns the content address of a registered waiver satisfying the
    /// same conditions as [`Self::has_valid_waiver`], for use as a
    /// `waiver_refs` entry.
    #[must_use]
    pub fn find_valid_waiver(&self, scope: &WaiverScope, now: Timestamp) -> Option<ContentAddress> {
        let guard = self.registered.lock().ok()?;
        guard
            .iter()
            .find(|entry| {
                entry.waiver.scope == *scope
                    && entry.waiver.expires_at > now
                    && (self.mode != WaiverMode::Strict || entry.waiver.signature_verified)
            })
            .map(|entry| entry.content_address.clone())
    }
}

/// Borrows the subset of `waiver`'s fields that are signed, for
/// verification against `signature`.
fn signable(waiver: &WaiverArtifact) -> corvusforge_core::WaiverSignable<'_> {
    waiver.signable_view()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test assertions use unwrap for brevity")]
    use std::sync::Arc;

    use corvusforge_core::StageIdentifier;
    use corvusforge_core::WaiverId;
    use corvusforge_crypto::NativeEd25519Provider;
    use corvusforge_store::FilesystemArtifactStore;

    use super::*;

    fn sample_waiver(approving_identity: &str, signature: &str, expires_at: Timestamp) -> WaiverArtifact {
        WaiverArtifact {
            waiver_id: WaiverId::new("waiver-1"),
            scope: WaiverScope { stage_id: StageIdentifier::S55Accessibility, gate_name: "accessibility".to_string() },
            justification: "temporary bypass pending follow-up".to_string(),
            approving_identity: approving_identity.to_string(),
            signature: signature.to_string(),
            issued_at: Timestamp::now(),
            expires_at,
            signature_verified: false,
        }
    }

    fn future_timestamp() -> Timestamp {
        Timestamp::now().clamp_after(Timestamp::now())
    }

    #[test]
    fn permissive_mode_stores_unverifiable_waiver_with_false_flag() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FilesystemArtifactStore::open(dir.path()).unwrap());
        let provider: Arc<dyn CryptoProvider> = Arc::new(NativeEd25519Provider::new());
        let manager = WaiverManager::new(WaiverMode::Permissive, provider, store);
        let waiver = sample_waiver("not-a-real-key", "not-a-real-signature", future_timestamp());
        let registered = manager.register_waiver(waiver).unwrap();
        assert!(!registered.waiver.signature_verified);
    }

    #[test]
    fn strict_mode_rejects_unverifiable_waiver() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FilesystemArtifactStore::open(dir.path()).unwrap());
        let provider: Arc<dyn CryptoProvider> = Arc::new(NativeEd25519Provider::new());
        let manager = WaiverManager::new(WaiverMode::Strict, provider, store);
        let waiver = sample_waiver("not-a-real-key", "", future_timestamp());
        let result = manager.register_waiver(waiver);
        assert!(matches!(result, Err(WaiverError::SignatureInvalid(_))));
    }

    #[test]
    fn strict_mode_accepts_genuinely_signed_waiver() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FilesystemArtifactStore::open(dir.path()).unwrap());
        let native = NativeEd25519Provider::new();
        let (private_hex, public_hex) = native.generate_keypair().unwrap();
        let mut waiver = sample_waiver(&public_hex, "", future_timestamp());
        let signed_bytes = corvusforge_core::canonical_bytes(&signable(&waiver)).unwrap();
        waiver.signature = native.sign(&signed_bytes, &private_hex).unwrap();

        let provider: Arc<dyn CryptoProvider> = Arc::new(native);
        let manager = WaiverManager::new(WaiverMode::Strict, provider, store);
        let registered = manager.register_waiver(waiver).unwrap();
        assert!(registered.waiver.signature_verified);
    }

    #[test]
    fn has_valid_waiver_is_false_after_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FilesystemArtifactStore::open(dir.path()).unwrap());
        let provider: Arc<dyn CryptoProvider> = Arc::new(NativeEd25519Provider::new());
        let manager = WaiverManager::new(WaiverMode::Permissive, provider, store);
        let past = Timestamp::now();
        let waiver = sample_waiver("key", "sig", past);
        let scope = waiver.scope.clone();
        manager.register_waiver(waiver).unwrap();
        assert!(!manager.has_valid_waiver(&scope, Timestamp::now().clamp_after(past)));
    }

    #[test]
    fn has_valid_waiver_does_not_match_a_different_scope() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FilesystemArtifactStore::open(dir.path()).unwrap());
        let native = NativeEd25519Provider::new();
        let (private_hex, public_hex) = native.generate_keypair().unwrap();
        let mut waiver = sample_waiver(&public_hex, "", future_timestamp());
        let signed_bytes = corvusforge_core::canonical_bytes(&signable(&waiver)).unwrap();
        waiver.signature = native.sign(&signed_bytes, &private_hex).unwrap();

        let provider: Arc<dyn CryptoProvider> = Arc::new(native);
        let manager = WaiverManager::new(WaiverMode::Strict, provider, store);
        manager.register_waiver(waiver).unwrap();

        let other_scope = WaiverScope { stage_id: StageIdentifier::S575Security, gate_name: "security".to_string() };
        assert!(!manager.has_valid_waiver(&other_scope, Timestamp::now()));
    }
}
