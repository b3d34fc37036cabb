// crates/corvusforge-core/src/lib.rs
// ============================================================================
// Crate: corvusforge-core
// Description: Shared data model and trait seams for the Corvusforge
// pipeline orchestrator.
// Purpose: Give every satellite crate (crypto, store, waivers, broker,
// config, orchestrator) one dependency-free place to share identifiers,
// canonical hashing, the stage machine's data tables, and the trait
// boundaries between components.
// ============================================================================

//! # corvusforge-core
//!
//! Shared types for Corvusforge: identifiers, the canonical hashing
//! primitives the whole system hashes through, the stage/transition tables,
//! hash-chained record types, and the trait seams (`CryptoProvider`,
//! `LedgerStore`, `ArtifactStoreApi`, `Sink`) that satellite crates
//! implement. This crate has no I/O of its own.

pub mod graph;
pub mod hashing;
pub mod identifiers;
pub mod interfaces;
pub mod records;
pub mod stage;
pub mod time;

pub use graph::GraphError;
pub use graph::PrerequisiteGraph;
pub use hashing::HashError;
pub use hashing::canonical_bytes;
pub use hashing::hash_canonical_json;
pub use hashing::sha256_hex;
pub use identifiers::ContentAddress;
pub use identifiers::EntryId;
pub use identifiers::EnvelopeId;
pub use identifiers::RunId;
pub use identifiers::WaiverId;
pub use interfaces::ArtifactError;
pub use interfaces::ArtifactStoreApi;
pub use interfaces::CryptoError;
pub use interfaces::CryptoProvider;
pub use interfaces::LedgerError;
pub use interfaces::LedgerStore;
pub use interfaces::Sink;
pub use interfaces::SinkError;
pub use interfaces::VerifiedSignature;
pub use records::Artifact;
pub use records::Envelope;
pub use records::EnvelopeKind;
pub use records::LedgerAnchor;
pub use records::LedgerAnchorHashable;
pub use records::LedgerEntry;
pub use records::LedgerEntryDraft;
pub use records::StateTransition;
pub use records::TRUST_CONTEXT_VERSION;
pub use records::TrustContext;
pub use records::WaiverArtifact;
pub use records::WaiverScope;
pub use records::WaiverSignable;
pub use stage::ALL_STAGES;
pub use stage::ALLOWED_TRANSITIONS;
pub use stage::StageIdentifier;
pub use stage::StageState;
pub use stage::is_allowed_transition;
pub use time::Timestamp;
pub use time::TimestampError;
