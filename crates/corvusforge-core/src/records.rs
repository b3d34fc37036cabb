// crates/corvusforge-core/src/records.rs
// ============================================================================
// Module: Corvusforge Record Types
// Description: The hash-chained ledger entry, run anchor, trust context,
// waiver artifact, envelope, and content-addressed artifact data types.
// Purpose: Centralize the record shapes shared across every satellite crate.
// Dependencies: serde, crate::hashing, crate::identifiers, crate::stage,
// crate::time
// ============================================================================

//! ## Overview
//! These types are pure data: construction of a [`LedgerEntry`] from a
//! [`LedgerEntryDraft`] is the only place `entry_hash` is computed, which
//! keeps the hash-chaining invariant (entry N's hash depends on entry N-1's
//! hash) enforced by the type rather than by caller discipline. Hex hashes
//! that may be absent (`input_hash`, `output_hash`, `previous_entry_hash`,
//! trust fingerprints) use the empty string rather than `Option`, matching
//! the wire shape callers already serialize against.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::hashing::HashError;
use crate::hashing::hash_canonical_json;
use crate::identifiers::ContentAddress;
use crate::identifiers::EntryId;
use crate::identifiers::EnvelopeId;
use crate::identifiers::RunId;
use crate::identifiers::WaiverId;
use crate::stage::StageIdentifier;
use crate::stage::StageState;
use crate::time::Timestamp;

/// Current trust-context schema version.
pub const TRUST_CONTEXT_VERSION: &str = "1";

// ============================================================================
// SECTION: Trust Context
// ============================================================================

/// The three key fingerprints sealed into every ledger entry by
/// `compute_trust_context` (spec §4.4).
///
/// # Invariants
/// - Each fingerprint is either exactly 16 lowercase hex characters, or the
///   empty string when the corresponding key is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustContext {
    /// Fingerprint of the plugin trust root key, or empty if absent.
    pub plugin_trust_root_fp: String,
    /// Fingerprint of the waiver signing key, or empty if absent.
    pub waiver_signing_key_fp: String,
    /// Fingerprint of the anchor signing key, or empty if absent.
    pub anchor_key_fp: String,
}

// ============================================================================
// SECTION: State Transition
// ============================================================================

/// A single `from` -> `to` stage state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    /// State the stage transitioned from.
    pub from: StageState,
    /// State the stage transitioned to.
    pub to: StageState,
}

// ============================================================================
// SECTION: Ledger Entry
// ============================================================================

/// An unfinalized ledger entry, not yet chained to a predecessor.
///
/// Construct a draft, then call [`LedgerEntryDraft::finalize`] to compute the
/// entry's `entry_hash` by chaining it against the previous entry's hash.
/// This ensures `entry_hash` can never be set independently of the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntryDraft {
    /// Entry identifier, unique within the run.
    pub entry_id: EntryId,
    /// Run this entry belongs to.
    pub run_id: RunId,
    /// Stage this entry records a transition for.
    pub stage_id: StageIdentifier,
    /// The state transition this entry records.
    pub state_transition: StateTransition,
    /// Timestamp of the transition.
    pub timestamp_utc: Timestamp,
    /// SHA-256 hex of the stage's input, or empty string.
    pub input_hash: String,
    /// SHA-256 hex of the stage's output, or empty string.
    pub output_hash: String,
    /// Ordered content addresses of artifacts produced or consumed.
    pub artifact_refs: Vec<ContentAddress>,
    /// Pipeline version active for this run.
    pub pipeline_version: String,
    /// Schema version this entry conforms to.
    pub schema_version: String,
    /// Toolchain version active for this run.
    pub toolchain_version: String,
    /// Ruleset name to version mapping active for this run.
    pub ruleset_versions: BTreeMap<String, String>,
    /// Ordered content addresses of waivers applied to this transition.
    pub waiver_refs: Vec<ContentAddress>,
    /// Trust context sealed into this entry.
    pub trust_context: TrustContext,
    /// Trust context schema version.
    pub trust_context_version: String,
    /// SHA-256 of the canonical JSON of the stage-specific payload.
    pub payload_hash: String,
}

impl LedgerEntryDraft {
    /// Computes `entry_hash` by hashing this draft together with the
    /// previous entry's hash, producing a finalized [`LedgerEntry`].
    ///
    /// `previous_entry_hash` is the empty string only for a run's first
    /// entry.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the draft cannot be canonicalized.
    pub fn finalize(self, previous_entry_hash: String) -> Result<LedgerEntry, HashError> {
        let chained = ChainedForHashing { draft: &self, previous_entry_hash: &previous_entry_hash };
        let entry_hash = hash_canonical_json(&chained)?;
        Ok(LedgerEntry {
            entry_id: self.entry_id,
            run_id: self.run_id,
            stage_id: self.stage_id,
            state_transition: self.state_transition,
            timestamp_utc: self.timestamp_utc,
            input_hash: self.input_hash,
            output_hash: self.output_hash,
            artifact_refs: self.artifact_refs,
            pipeline_version: self.pipeline_version,
            schema_version: self.schema_version,
            toolchain_version: self.toolchain_version,
            ruleset_versions: self.ruleset_versions,
            waiver_refs: self.waiver_refs,
            trust_context: self.trust_context,
            trust_context_version: self.trust_context_version,
            payload_hash: self.payload_hash,
            previous_entry_hash,
            entry_hash,
        })
    }
}

/// Intermediate shape hashed to produce `entry_hash`; never serialized onto
/// the wire on its own. `#[serde(flatten)]` puts `previous_entry_hash`
/// alongside the draft's own fields in the same JSON object, matching
/// `fields(e)` in spec.md §3's hash formula — `previous_entry_hash` is a
/// sibling field of the entry being hashed, not a wrapper around it.
#[derive(Serialize)]
struct ChainedForHashing<'a> {
    #[serde(flatten)]
    draft: &'a LedgerEntryDraft,
    previous_entry_hash: &'a str,
}

/// A finalized, hash-chained entry in a run's ledger (spec §3).
///
/// # Invariants
/// - `entry_hash` is the canonical-JSON SHA-256 digest of every other field
///   on this entry; it cannot be constructed any other way than via
///   [`LedgerEntryDraft::finalize`].
/// - `entry_hash` is globally unique (enforced at the storage layer).
/// - Entries within a run form a strict total order by insertion; each
///   entry's `previous_entry_hash` equals its predecessor's `entry_hash`.
/// - Entries are append-only and immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Entry identifier, unique within the run.
    pub entry_id: EntryId,
    /// Run this entry belongs to.
    pub run_id: RunId,
    /// Stage this entry records a transition for.
    pub stage_id: StageIdentifier,
    /// The state transition this entry records.
    pub state_transition: StateTransition,
    /// Timestamp of the transition.
    pub timestamp_utc: Timestamp,
    /// SHA-256 hex of the stage's input, or empty string.
    pub input_hash: String,
    /// SHA-256 hex of the stage's output, or empty string.
    pub output_hash: String,
    /// Ordered content addresses of artifacts produced or consumed.
    pub artifact_refs: Vec<ContentAddress>,
    /// Pipeline version active for this run.
    pub pipeline_version: String,
    /// Schema version this entry conforms to.
    pub schema_version: String,
    /// Toolchain version active for this run.
    pub toolchain_version: String,
    /// Ruleset name to version mapping active for this run.
    pub ruleset_versions: BTreeMap<String, String>,
    /// Ordered content addresses of waivers applied to this transition.
    pub waiver_refs: Vec<ContentAddress>,
    /// Trust context sealed into this entry.
    pub trust_context: TrustContext,
    /// Trust context schema version.
    pub trust_context_version: String,
    /// SHA-256 of the canonical JSON of the stage-specific payload.
    pub payload_hash: String,
    /// Hash of the previous entry in this run's chain, or the empty string
    /// for the first entry.
    pub previous_entry_hash: String,
    /// SHA-256 hex digest chaining this entry to its predecessor.
    pub entry_hash: String,
}

// ============================================================================
// SECTION: Ledger Anchor
// ============================================================================

/// A point-in-time, independently verifiable summary of a run's ledger
/// chain, suitable for export outside the store (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerAnchor {
    /// Run this anchor summarizes.
    pub run_id: RunId,
    /// Number of entries covered by this anchor.
    pub entry_count: u64,
    /// Hash of the chain's root, for `entry_count` == 0 the empty string.
    pub root_hash: String,
    /// Hash of the first entry covered by this anchor, or empty if none.
    pub first_entry_hash: String,
    /// Timestamp the anchor was produced.
    pub timestamp_utc: Timestamp,
    /// SHA-256 of the canonical JSON of every other field on this anchor.
    pub anchor_hash: String,
    /// Detached signature over `anchor_hash`, or `None` if the anchor is
    /// unsigned.
    pub signature: Option<String>,
}

impl LedgerAnchor {
    /// Returns the subset of fields hashed to produce `anchor_hash`.
    #[must_use]
    pub fn hashable_view(&self) -> LedgerAnchorHashable<'_> {
        LedgerAnchorHashable {
            run_id: &self.run_id,
            entry_count: self.entry_count,
            root_hash: &self.root_hash,
            first_entry_hash: &self.first_entry_hash,
            timestamp_utc: self.timestamp_utc,
        }
    }
}

/// The hashed subset of a [`LedgerAnchor`]'s fields (every field except
/// `anchor_hash` and `signature`).
#[derive(Debug, Clone, Serialize)]
pub struct LedgerAnchorHashable<'a> {
    run_id: &'a RunId,
    entry_count: u64,
    root_hash: &'a str,
    first_entry_hash: &'a str,
    timestamp_utc: Timestamp,
}

// ============================================================================
// SECTION: Waiver Artifact
// ============================================================================

/// What a waiver covers: a stage and a named gate within that stage.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WaiverScope {
    /// Stage this waiver covers.
    pub stage_id: StageIdentifier,
    /// Name of the gate within the stage being waived.
    pub gate_name: String,
}

/// A signed gate-bypass artifact (spec §3, §4.5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaiverArtifact {
    /// Waiver identifier.
    pub waiver_id: WaiverId,
    /// Scope this waiver applies to.
    pub scope: WaiverScope,
    /// Operator-supplied justification.
    pub justification: String,
    /// Hex-encoded public key of the approving identity.
    pub approving_identity: String,
    /// Hex-encoded detached signature over this waiver's signed fields.
    pub signature: String,
    /// Timestamp the waiver was issued.
    pub issued_at: Timestamp,
    /// Timestamp after which the waiver no longer applies.
    pub expires_at: Timestamp,
    /// Whether the crypto provider chain verified `signature`; set by the
    /// Waiver Manager, never by the caller.
    pub signature_verified: bool,
}

impl WaiverArtifact {
    /// Returns the subset of fields that are signed: every field on this
    /// waiver except `signature` and `signature_verified`.
    #[must_use]
    pub fn signable_view(&self) -> WaiverSignable<'_> {
        WaiverSignable {
            waiver_id: &self.waiver_id,
            scope: &self.scope,
            justification: &self.justification,
            approving_identity: &self.approving_identity,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
        }
    }
}

/// The signed subset of a [`WaiverArtifact`]'s fields.
#[derive(Debug, Clone, Serialize)]
pub struct WaiverSignable<'a> {
    waiver_id: &'a WaiverId,
    scope: &'a WaiverScope,
    justification: &'a str,
    approving_identity: &'a str,
    issued_at: Timestamp,
    expires_at: Timestamp,
}

// ============================================================================
// SECTION: Envelope
// ============================================================================

/// The six defined envelope kinds (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum EnvelopeKind {
    /// A unit of work dispatched to a node.
    WorkOrder,
    /// A notification of something that occurred.
    Event,
    /// A content-addressed artifact reference.
    Artifact,
    /// A request for clarification from a downstream node.
    Clarification,
    /// A failure report.
    Failure,
    /// A response to a prior envelope.
    Response,
}

impl EnvelopeKind {
    /// Parses an envelope kind from its wire string form.
    #[must_use]
    pub fn from_str_opt(value: &str) -> Option<Self> {
        match value {
            "WorkOrder" => Some(Self::WorkOrder),
            "Event" => Some(Self::Event),
            "Artifact" => Some(Self::Artifact),
            "Clarification" => Some(Self::Clarification),
            "Failure" => Some(Self::Failure),
            "Response" => Some(Self::Response),
            _ => None,
        }
    }
}

/// A validated inbound message (spec §3, §4.7).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Envelope identifier.
    pub envelope_id: EnvelopeId,
    /// Run this envelope applies to.
    pub run_id: RunId,
    /// Node that originated this envelope.
    pub source_node_id: String,
    /// Node this envelope is addressed to.
    pub destination_node_id: String,
    /// Kind of payload this envelope carries.
    pub envelope_kind: EnvelopeKind,
    /// SHA-256 of the canonical JSON of `payload`.
    pub payload_hash: String,
    /// Timestamp this envelope was produced.
    pub timestamp_utc: Timestamp,
    /// Schema version the payload conforms to.
    pub schema_version: String,
    /// The envelope's payload.
    pub payload: serde_json::Value,
}

// ============================================================================
// SECTION: Artifact
// ============================================================================

/// A content-addressed blob stored by the artifact store (spec §3, §4.6).
///
/// # Invariants
/// - `content_address` is always `sha256_hex(bytes)`; the address is the
///   artifact's identity, not a caller-supplied label.
/// - `size_bytes` equals `bytes.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Content address (identity) of this artifact.
    pub content_address: ContentAddress,
    /// Size of `bytes` in bytes.
    pub size_bytes: u64,
    /// Caller-declared media type (not part of the address).
    pub media_type: String,
    /// Raw bytes of the artifact.
    pub bytes: Vec<u8>,
}

impl Artifact {
    /// Builds an artifact from raw bytes and a media type, computing its
    /// content address.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        let content_address = ContentAddress::new(crate::hashing::sha256_hex(&bytes));
        let size_bytes = bytes.len() as u64;
        Self { content_address, size_bytes, media_type: media_type.into(), bytes }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test assertions use unwrap for brevity")]
    use super::*;

    fn sample_draft() -> LedgerEntryDraft {
        LedgerEntryDraft {
            entry_id: EntryId::new("entry-1"),
            run_id: RunId::new("run-1"),
            stage_id: StageIdentifier::S0Intake,
            state_transition: StateTransition { from: StageState::NotStarted, to: StageState::Running },
            timestamp_utc: Timestamp::now(),
            input_hash: String::new(),
            output_hash: String::new(),
            artifact_refs: Vec::new(),
            pipeline_version: "1.0.0".to_string(),
            schema_version: "1".to_string(),
            toolchain_version: "1.92".to_string(),
            ruleset_versions: BTreeMap::new(),
            waiver_refs: Vec::new(),
            trust_context: TrustContext::default(),
            trust_context_version: TRUST_CONTEXT_VERSION.to_string(),
            payload_hash: crate::hashing::sha256_hex(b"{}"),
        }
    }

    #[test]
    fn finalize_computes_entry_hash_deterministically() {
        let draft = sample_draft();
        let entry = draft.clone().finalize(String::new()).unwrap();
        let again = draft.finalize(String::new()).unwrap();
        assert_eq!(entry.entry_hash, again.entry_hash);
    }

    #[test]
    fn finalize_chains_previous_hash_into_entry_hash() {
        let draft = sample_draft();
        let without_prev = draft.clone().finalize(String::new()).unwrap();
        let with_prev = draft.finalize("deadbeef".to_string()).unwrap();
        assert_ne!(without_prev.entry_hash, with_prev.entry_hash);
    }

    #[test]
    fn artifact_address_is_content_derived() {
        let artifact = Artifact::from_bytes(b"hello".to_vec(), "text/plain".to_string());
        let expected = crate::hashing::sha256_hex(b"hello");
        assert_eq!(artifact.content_address.as_str(), expected);
        assert_eq!(artifact.size_bytes, 5);
    }

    #[test]
    fn anchor_hashable_view_excludes_anchor_hash_and_signature() {
        let anchor = LedgerAnchor {
            run_id: RunId::new("run-1"),
            entry_count: 4,
            root_hash: "abc123".to_string(),
            first_entry_hash: "abc000".to_string(),
            timestamp_utc: Timestamp::now(),
            anchor_hash: "computed".to_string(),
            signature: Some("sig".to_string()),
        };
        let bytes = hash_canonical_json(&anchor.hashable_view()).unwrap();
        assert!(!bytes.is_empty());
    }

    #[test]
    fn envelope_kind_round_trips_through_wire_string() {
        for kind in [
            EnvelopeKind::WorkOrder,
            EnvelopeKind::Event,
            EnvelopeKind::Artifact,
            EnvelopeKind::Clarification,
            EnvelopeKind::Failure,
            EnvelopeKind::Response,
        ] {
            let text = serde_json::to_string(&kind).unwrap();
            let parsed: EnvelopeKind = serde_json::from_str(&text).unwrap();
            assert_eq!(parsed, kind);
        }
    }
}
