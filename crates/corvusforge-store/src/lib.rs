// crates/corvusforge-store/src/lib.rs
// ============================================================================
// Crate: corvusforge-store
// Description: Durable backends for the Run Ledger and Artifact Store.
// Purpose: Give the orchestrator a `SQLite`-backed hash-chained ledger and a
// filesystem-backed content-addressed blob store, both implementing the
// trait seams defined in `corvusforge-core`.
// ============================================================================

//! # corvusforge-store
//!
//! [`SqliteLedgerStore`] implements `corvusforge_core::LedgerStore` over a
//! single `SQLite` database file; [`FilesystemArtifactStore`] implements
//! `corvusforge_core::ArtifactStoreApi` over a sharded directory tree.

mod artifacts;
mod ledger;

pub use artifacts::FilesystemArtifactStore;
pub use ledger::SqliteLedgerStore;
