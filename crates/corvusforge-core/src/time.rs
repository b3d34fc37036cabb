// crates/corvusforge-core/src/time.rs
// ============================================================================
// Module: Corvusforge Time Model
// Description: Canonical UTC timestamp representation for ledger entries and
// anchors.
// Purpose: Provide a microsecond-precision, monotonic-clampable timestamp
// type with a stable ISO 8601 wire form.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Ledger entries carry `timestamp_utc` at microsecond precision and must be
//! monotonic within a run (`spec` §4.3). This module owns the wire
//! representation and the clamp-and-increment helper; the Run Ledger is
//! responsible for calling [`Timestamp::clamp_after`] when appending.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// A UTC timestamp at microsecond precision.
///
/// # Invariants
/// - Always UTC; the offset is normalized to zero on construction.
/// - Serializes as an RFC 3339 string with microsecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(OffsetDateTime);

impl Timestamp {
    /// Creates a timestamp from the current system clock, truncated to
    /// microsecond precision.
    #[must_use]
    pub fn now() -> Self {
        Self::from_offset(OffsetDateTime::now_utc())
    }

    /// Creates a timestamp from an [`OffsetDateTime`], normalizing to UTC and
    /// truncating to microsecond precision.
    #[must_use]
    pub fn from_offset(value: OffsetDateTime) -> Self {
        let utc = value.to_offset(time::UtcOffset::UTC);
        let micros = utc.microsecond();
        let truncated = utc.replace_nanosecond(u32::from(micros) * 1_000).unwrap_or(utc);
        Self(truncated)
    }

    /// Parses a timestamp from its RFC 3339 wire form.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError::Parse`] when `value` is not valid RFC 3339.
    pub fn parse(value: &str) -> Result<Self, TimestampError> {
        OffsetDateTime::parse(value, &Rfc3339)
            .map(Self::from_offset)
            .map_err(|err| TimestampError::Parse(err.to_string()))
    }

    /// Returns this timestamp advanced by one microsecond if `self <= floor`,
    /// otherwise returns `self` unchanged.
    ///
    /// Implements the Run Ledger's per-run monotonicity clamp: on clock
    /// regression, the new entry's timestamp is clamped to `floor + 1us`.
    #[must_use]
    pub fn clamp_after(self, floor: Self) -> Self {
        if self > floor {
            self
        } else {
            let advanced = floor.0.saturating_add(time::Duration::microseconds(1));
            Self(advanced)
        }
    }

    /// Returns the underlying [`OffsetDateTime`].
    #[must_use]
    pub const fn as_offset(&self) -> OffsetDateTime {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatted = self.0.format(&Rfc3339).map_err(|_| fmt::Error)?;
        f.write_str(&formatted)
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Errors raised while parsing a [`Timestamp`].
#[derive(Debug, thiserror::Error)]
pub enum TimestampError {
    /// The input was not valid RFC 3339.
    #[error("invalid timestamp: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "test assertions use unwrap/expect for brevity"
    )]
    use super::*;

    #[test]
    fn round_trips_through_display_and_parse() {
        let ts = Timestamp::now();
        let text = ts.to_string();
        let parsed = Timestamp::parse(&text).expect("parse should succeed");
        assert_eq!(ts, parsed);
    }

    fn one_second_before(ts: Timestamp) -> Timestamp {
        Timestamp(ts.0.saturating_sub(time::Duration::seconds(1)))
    }

    #[test]
    fn clamp_after_advances_on_regression() {
        let floor = Timestamp::now();
        let regressed = one_second_before(floor);
        let clamped = regressed.clamp_after(floor);
        assert!(clamped > floor);
    }

    #[test]
    fn clamp_after_is_identity_when_already_monotonic() {
        let floor = Timestamp::now();
        let later = Timestamp(floor.0.saturating_add(time::Duration::seconds(1)));
        assert_eq!(later.clamp_after(floor), later);
    }
}
