// crates/corvusforge-core/src/stage.rs
// ============================================================================
// Module: Corvusforge Stage Identifiers and States
// Description: The fixed stage set, run-scoped stage state, and the allowed
// state-transition table.
// Purpose: Make the Stage Machine's edge table a lookup over data rather than
// a switch over the source state.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Corvusforge drives a fixed, ordered sequence of pipeline stages. The set
//! of stage identifiers and the set of allowed state transitions are closed
//! and are represented as data (a const array), not as control flow, so that
//! [`ALLOWED_TRANSITIONS`] is the single place a reviewer needs to check for
//! the whole edge table.

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Stage Identifier
// ============================================================================

/// One of the ten fixed pipeline stages.
///
/// # Invariants
/// - The variant set is closed; [`ALL_STAGES`] enumerates it in pipeline
///   order and is the only source of truth for stage ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageIdentifier {
    /// Run intake.
    S0Intake,
    /// Prerequisite resolution.
    S1Prerequisites,
    /// Environment preparation.
    S2Environment,
    /// Test contracting.
    S3TestContracting,
    /// Code planning.
    S4CodePlan,
    /// Implementation.
    S5Implementation,
    /// Accessibility gate.
    S55Accessibility,
    /// Security gate.
    S575Security,
    /// Verification.
    S6Verification,
    /// Release.
    S7Release,
}

impl StageIdentifier {
    /// Returns the wire-stable identifier string for this stage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::S0Intake => "s0_intake",
            Self::S1Prerequisites => "s1_prerequisites",
            Self::S2Environment => "s2_environment",
            Self::S3TestContracting => "s3_test_contracting",
            Self::S4CodePlan => "s4_code_plan",
            Self::S5Implementation => "s5_implementation",
            Self::S55Accessibility => "s55_accessibility",
            Self::S575Security => "s575_security",
            Self::S6Verification => "s6_verification",
            Self::S7Release => "s7_release",
        }
    }

    /// Parses a stage identifier from its wire-stable string form.
    #[must_use]
    pub fn from_str_opt(value: &str) -> Option<Self> {
        ALL_STAGES.iter().copied().find(|stage| stage.as_str() == value)
    }
}

impl std::fmt::Display for StageIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All stages in pipeline order.
///
/// # Invariants
/// - Matches the fixed ordered set named in the stage identifier section.
pub const ALL_STAGES: [StageIdentifier; 10] = [
    StageIdentifier::S0Intake,
    StageIdentifier::S1Prerequisites,
    StageIdentifier::S2Environment,
    StageIdentifier::S3TestContracting,
    StageIdentifier::S4CodePlan,
    StageIdentifier::S5Implementation,
    StageIdentifier::S55Accessibility,
    StageIdentifier::S575Security,
    StageIdentifier::S6Verification,
    StageIdentifier::S7Release,
];

// ============================================================================
// SECTION: Stage State
// ============================================================================

/// Lifecycle state of a stage within a run.
///
/// # Invariants
/// - Only transitions present in [`ALLOWED_TRANSITIONS`] may be recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    /// Stage has not yet been attempted.
    NotStarted,
    /// Stage is currently executing.
    Running,
    /// Stage completed successfully.
    Passed,
    /// Stage completed unsuccessfully.
    Failed,
    /// Stage is blocked by a failed predecessor.
    Blocked,
}

impl StageState {
    /// Returns the wire-stable identifier string for this state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::Running => "RUNNING",
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
            Self::Blocked => "BLOCKED",
        }
    }
}

impl std::fmt::Display for StageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Allowed Transition Table
// ============================================================================

/// The complete allowed-edge table for stage state transitions. All other
/// `(from, to)` pairs are forbidden.
///
/// # Invariants
/// - This is the single source of truth for edge validity; the Stage Machine
///   looks this table up rather than branching on the source state.
pub const ALLOWED_TRANSITIONS: &[(StageState, StageState)] = &[
    (StageState::NotStarted, StageState::Running),
    (StageState::NotStarted, StageState::Blocked),
    (StageState::Running, StageState::Passed),
    (StageState::Running, StageState::Failed),
    (StageState::Failed, StageState::Running),
    (StageState::Blocked, StageState::NotStarted),
];

/// Returns `true` iff `(from, to)` is a permitted edge in [`ALLOWED_TRANSITIONS`].
#[must_use]
pub fn is_allowed_transition(from: StageState, to: StageState) -> bool {
    ALLOWED_TRANSITIONS.iter().any(|&(f, t)| f == from && t == to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_identifier_round_trips_through_wire_string() {
        for stage in ALL_STAGES {
            assert_eq!(StageIdentifier::from_str_opt(stage.as_str()), Some(stage));
        }
    }

    #[test]
    fn unknown_stage_string_is_rejected() {
        assert_eq!(StageIdentifier::from_str_opt("s99_nonexistent"), None);
    }

    #[test]
    fn not_started_to_running_is_allowed() {
        assert!(is_allowed_transition(StageState::NotStarted, StageState::Running));
    }

    #[test]
    fn passed_to_running_is_not_allowed() {
        assert!(!is_allowed_transition(StageState::Passed, StageState::Running));
    }

    #[test]
    fn running_to_not_started_is_not_allowed() {
        assert!(!is_allowed_transition(StageState::Running, StageState::NotStarted));
    }

    #[test]
    fn every_state_has_at_least_one_outgoing_or_is_terminal_by_design() {
        // PASSED and FAILED are not required to have outgoing edges of their
        // own (FAILED retries via Failed -> Running, PASSED has none), but
        // the table itself must be non-empty and internally consistent.
        assert!(!ALLOWED_TRANSITIONS.is_empty());
    }
}
