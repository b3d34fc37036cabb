// crates/corvusforge-core/src/identifiers.rs
// ============================================================================
// Module: Corvusforge Identifiers
// Description: Canonical opaque identifiers for runs, ledger entries, content
// addresses, and waivers.
// Purpose: Provide strongly typed, serializable identifiers with stable wire
// forms instead of bare strings at call sites.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Identifiers are opaque UTF-8 strings that serialize transparently on the
//! wire. No normalization is performed; callers are responsible for choosing
//! identifiers that are unique within their scope (the Run Ledger enforces
//! `entry_hash` uniqueness independently at the storage layer).

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Run identifier; owns a hash-chained sequence of ledger entries.
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization or validation is applied by this type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Creates a new run identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RunId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RunId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Ledger entry identifier, unique within its run.
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization or validation is applied by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    /// Creates a new entry identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for EntryId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EntryId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Content address: the lowercase hex SHA-256 digest of an artifact's bytes.
///
/// # Invariants
/// - Always 64 lowercase hex characters once produced by [`crate::hashing::sha256_hex`].
/// - This type does not itself validate that invariant; constructors that
///   accept untrusted strings (e.g. deserialization) must check it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentAddress(String);

impl ContentAddress {
    /// Creates a content address from an already-computed hex digest.
    #[must_use]
    pub fn new(hex_digest: impl Into<String>) -> Self {
        Self(hex_digest.into())
    }

    /// Returns the address as a lowercase hex string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the two-character shard prefix used by the artifact store's
    /// on-disk layout.
    ///
    /// # Panics
    ///
    /// Panics if the address has fewer than two characters; callers must
    /// only construct addresses from `sha256_hex` output.
    #[must_use]
    pub fn shard_prefix(&self) -> &str {
        &self.0[..2]
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ContentAddress {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ContentAddress {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Waiver identifier, unique within the waiver registry.
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization or validation is applied by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaiverId(String);

impl WaiverId {
    /// Creates a new waiver identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WaiverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for WaiverId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for WaiverId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Envelope identifier, unique within a run.
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization or validation is applied by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvelopeId(String);

impl EnvelopeId {
    /// Creates a new envelope identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EnvelopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for EnvelopeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EnvelopeId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
