// crates/corvusforge-core/src/interfaces.rs
// ============================================================================
// Module: Corvusforge Interfaces
// Description: The trait seams implemented by satellite crates: crypto
// provider, ledger store, artifact store, and sink.
// Purpose: Let the orchestrator depend on behavior, not on concrete satellite
// crates, so providers, stores, and sinks are swappable.
// Dependencies: thiserror, crate::identifiers, crate::records
// ============================================================================

//! ## Overview
//! Every satellite crate implements exactly one trait from this module. The
//! orchestrator crate depends only on these traits (plus the data types in
//! [`crate::records`]), never on a concrete satellite crate directly.

use thiserror::Error;

use crate::identifiers::ContentAddress;
use crate::identifiers::RunId;
use crate::records::Artifact;
use crate::records::Envelope;
use crate::records::LedgerAnchor;
use crate::records::LedgerEntry;
use crate::records::LedgerEntryDraft;

// ============================================================================
// SECTION: Crypto Provider
// ============================================================================

/// Errors raised by a [`CryptoProvider`].
#[derive(Debug, Error)]
pub enum CryptoError {
    /// No usable signing backend is available; the provider chain fails
    /// closed rather than returning an unsigned result silently.
    #[error("no crypto provider available: {0}")]
    Unavailable(String),
    /// The supplied key material was malformed.
    #[error("invalid key material: {0}")]
    InvalidKey(String),
}

/// A verified Ed25519 signature.
///
/// # Invariants
/// - Can only be constructed by [`CryptoProvider::verify`] inside the crypto
///   crate; no other code path can fabricate a "verified" result, so a
///   `VerifiedSignature` in hand is proof the check actually ran and passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSignature {
    public_key_hex: String,
}

impl VerifiedSignature {
    /// Constructs a verified signature marker.
    ///
    /// Not `pub`: only code inside the crypto provider chain may attest that
    /// a signature verified.
    #[must_use]
    pub(crate) fn new(public_key_hex: String) -> Self {
        Self { public_key_hex }
    }

    /// Returns the hex-encoded public key the signature verified against.
    #[must_use]
    pub fn public_key_hex(&self) -> &str {
        &self.public_key_hex
    }
}

/// Signs and verifies byte payloads on behalf of the Run Ledger, Waiver
/// Manager, and Ledger Anchor export (spec §4.4).
///
/// Implementations form a capability-probed chain: the caller selects the
/// richest available provider once at startup and caches the choice, rather
/// than falling back per call. A fail-closed implementation must exist at
/// the bottom of the chain: its `verify` always returns `Ok(None)` and its
/// `sign`/`generate_keypair` always return [`CryptoError::Unavailable`].
pub trait CryptoProvider: Send + Sync {
    /// Name of this provider tier, recorded in trust contexts and audit
    /// logs.
    fn name(&self) -> &'static str;

    /// Whether this provider is a real cryptographic backend, as opposed to
    /// the fail-closed terminal tier. The Production Guard requires a real
    /// provider in production.
    fn is_real_provider(&self) -> bool;

    /// Generates a new Ed25519 keypair, returning `(private_hex, public_hex)`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Unavailable`] if this provider cannot generate
    /// keys (the fail-closed tier always returns this).
    fn generate_keypair(&self) -> Result<(String, String), CryptoError>;

    /// Signs `bytes` with the private key `private_hex`, returning a
    /// hex-encoded 64-byte Ed25519 signature.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] if `private_hex` is malformed, or
    /// [`CryptoError::Unavailable`] if this provider cannot sign.
    fn sign(&self, bytes: &[u8], private_hex: &str) -> Result<String, CryptoError>;

    /// Verifies `signature_hex` over `bytes` against `public_hex`.
    ///
    /// Returns `Ok(Some(VerifiedSignature))` when the signature is
    /// syntactically well-formed and cryptographically valid, `Ok(None)` for
    /// any malformed input or failed check, and never panics. This method
    /// must not return an `Err` for a failed verification: malformed hex, an
    /// empty signature, or an unavailable backend are all "not verified",
    /// not exceptional.
    fn verify(
        &self,
        bytes: &[u8],
        signature_hex: &str,
        public_hex: &str,
    ) -> Result<Option<VerifiedSignature>, CryptoError>;
}

// ============================================================================
// SECTION: Ledger Store
// ============================================================================

/// Errors raised by a [`LedgerStore`].
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The run does not exist.
    #[error("run not found: {0}")]
    RunNotFound(RunId),
    /// The run already exists.
    #[error("run already exists: {0}")]
    RunAlreadyExists(RunId),
    /// An entry with this hash already exists (defense-in-depth duplicate
    /// detection at the storage layer).
    #[error("duplicate entry hash for run {0}")]
    DuplicateEntry(RunId),
    /// The stored chain failed hash verification.
    #[error("ledger chain broken for run {0} at entry {1}")]
    ChainBroken(RunId, String),
    /// An underlying storage operation failed.
    #[error("ledger storage error: {0}")]
    Storage(String),
    /// The entry could not be hashed.
    #[error("failed to hash entry: {0}")]
    Hashing(#[from] crate::hashing::HashError),
    /// A chain failed to verify against a previously exported anchor.
    #[error("ledger for run {0} does not match anchor: {1}")]
    AnchorMismatch(RunId, String),
}

/// Appends and verifies a run's hash-chained ledger.
///
/// Implementations must serialize appends per run (spec §5: single writer
/// per run) and must treat a duplicate `entry_hash` as an error, not a
/// silent overwrite.
pub trait LedgerStore: Send + Sync {
    /// Registers a new, empty run.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::RunAlreadyExists`] if the run already exists,
    /// or [`LedgerError::Storage`] on an underlying failure.
    fn create_run(&self, run_id: &RunId) -> Result<(), LedgerError>;

    /// Appends `draft` to `run_id`'s chain, computing its `entry_hash`
    /// against the current head, and returns the finalized entry.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the run does not exist, the computed
    /// entry hash collides with an existing entry, or storage fails.
    fn append(&self, run_id: &RunId, draft: LedgerEntryDraft) -> Result<LedgerEntry, LedgerError>;

    /// Returns every entry recorded for `run_id`, in append order.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::RunNotFound`] if the run does not exist, or
    /// [`LedgerError::Storage`] on an underlying failure.
    fn entries(&self, run_id: &RunId) -> Result<Vec<LedgerEntry>, LedgerError>;

    /// Recomputes and checks every hash link in `run_id`'s chain.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ChainBroken`] at the first entry whose stored
    /// hash does not match its recomputed hash.
    fn verify_chain(&self, run_id: &RunId) -> Result<(), LedgerError>;

    /// Produces a [`LedgerAnchor`] summarizing the current head of
    /// `run_id`'s chain.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::RunNotFound`] if the run does not exist.
    fn export_anchor(&self, run_id: &RunId) -> Result<LedgerAnchor, LedgerError>;

    /// Verifies `run_id`'s current chain against a previously exported
    /// `anchor`: the anchor's own hash recomputes correctly, the chain has
    /// not been truncated below the anchor's `entry_count`, the first entry
    /// hash still matches (no retroactive rewrite), the entry at the
    /// anchor's checkpoint position still matches `root_hash`, and the full
    /// chain still verifies.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AnchorMismatch`] if any of the above checks
    /// fail, or [`LedgerError::ChainBroken`] if the chain itself does not
    /// verify.
    fn verify_against_anchor(&self, run_id: &RunId, anchor: &LedgerAnchor) -> Result<(), LedgerError>;
}

// ============================================================================
// SECTION: Artifact Store
// ============================================================================

/// Errors raised by an [`ArtifactStoreApi`].
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// No artifact exists at the requested address.
    #[error("artifact not found: {0}")]
    NotFound(ContentAddress),
    /// The stored bytes do not hash to their claimed address.
    #[error("artifact corrupted: address {0} does not match stored bytes")]
    Corrupted(ContentAddress),
    /// An underlying storage operation failed.
    #[error("artifact storage error: {0}")]
    Storage(String),
}

/// Stores and retrieves content-addressed artifacts (spec §4.6).
///
/// Implementations must treat the content address as the sole identity of an
/// artifact: writing the same bytes twice must be idempotent and must not
/// rewrite the existing blob.
pub trait ArtifactStoreApi: Send + Sync {
    /// Stores `bytes` under `media_type`, returning its content address.
    /// A second `put` of identical bytes returns the same address without
    /// rewriting the blob.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::Storage`] on an underlying failure.
    fn put(&self, bytes: &[u8], media_type: &str) -> Result<ContentAddress, ArtifactError>;

    /// Retrieves the artifact stored at `address`, re-verifying its SHA-256
    /// on read.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::NotFound`] if no artifact exists at
    /// `address`, or [`ArtifactError::Corrupted`] if the stored bytes no
    /// longer hash to `address`.
    fn get(&self, address: &ContentAddress) -> Result<Artifact, ArtifactError>;

    /// Recomputes the hash of the artifact stored at `address` and checks it
    /// against `address` itself.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::NotFound`] if no artifact exists at
    /// `address`.
    fn verify(&self, address: &ContentAddress) -> Result<bool, ArtifactError>;
}

// ============================================================================
// SECTION: Sink
// ============================================================================

/// Errors raised by a [`Sink`].
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink failed to deliver the envelope.
    #[error("sink {0} failed to deliver: {1}")]
    DeliveryFailed(String, String),
}

/// A delivery target registered with the Sink Dispatcher (spec §4.8).
///
/// Implementations should return `Err` rather than panic on delivery
/// failure; the dispatcher isolates per-sink failures so one broken sink
/// cannot block others, and does not retry (retry is a sink-internal
/// concern).
pub trait Sink: Send + Sync {
    /// Name of this sink, used as its registry key and in failure reports.
    fn name(&self) -> &str;

    /// Delivers `envelope` to this sink.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::DeliveryFailed`] if delivery fails.
    fn write(&self, envelope: &Envelope) -> Result<(), SinkError>;
}
