// crates/corvusforge-orchestrator/src/stage_machine.rs
// ============================================================================
// Module: Stage Machine
// Description: Transition validator consuming the Run Ledger, Prerequisite
// Graph, and Waiver Manager.
// Purpose: Be the single place a stage's state can change, so every change
// is both edge-checked against the allowed-transition table and recorded as
// a ledger entry in the same step.
// Dependencies: corvusforge-core, corvusforge-waivers
// ============================================================================

//! ## Overview
//! [`StageMachine::transition`] validates a `(from, to)` edge against
//! [`corvusforge_core::ALLOWED_TRANSITIONS`], validates the prerequisite
//! precondition for `NOT_STARTED -> RUNNING`, appends exactly one ledger
//! entry, and on `RUNNING -> FAILED` cascades a `NOT_STARTED -> BLOCKED`
//! entry to every transitive dependent that is currently `NOT_STARTED`. A
//! stage's current state is never stored separately from the ledger: it is
//! always the `to` state of its most recent entry, or `NOT_STARTED` if it
//! has none.

use std::collections::BTreeMap;
use std::sync::Arc;

use corvusforge_core::ALL_STAGES;
use corvusforge_core::ContentAddress;
use corvusforge_core::EntryId;
use corvusforge_core::HashError;
use corvusforge_core::LedgerEntry;
use corvusforge_core::LedgerEntryDraft;
use corvusforge_core::LedgerError;
use corvusforge_core::LedgerStore;
use corvusforge_core::PrerequisiteGraph;
use corvusforge_core::RunId;
use corvusforge_core::StageIdentifier;
use corvusforge_core::StageState;
use corvusforge_core::StateTransition;
use corvusforge_core::Timestamp;
use corvusforge_core::TRUST_CONTEXT_VERSION;
use corvusforge_core::TrustContext;
use corvusforge_core::WaiverScope;
use corvusforge_core::hash_canonical_json;
use corvusforge_core::is_allowed_transition;
use corvusforge_waivers::WaiverManager;
use thiserror::Error;

/// Pipeline-wide metadata sealed into every ledger entry a [`StageMachine`]
/// appends.
#[derive(Debug, Clone)]
pub struct PipelineMetadata {
    /// Version of the pipeline definition driving this run.
    pub pipeline_version: String,
    /// Toolchain version active for this run.
    pub toolchain_version: String,
    /// Ruleset name to version mapping active for this run.
    pub ruleset_versions: BTreeMap<String, String>,
    /// Ledger entry schema version; currently always `"1"`.
    pub schema_version: String,
}

/// Errors raised while validating or applying a stage transition.
#[derive(Debug, Error)]
pub enum StageMachineError {
    /// The requested `(from, to)` edge is not in the allowed-transition
    /// table.
    #[error("transition {from} -> {to} for stage {stage} is not allowed")]
    InvalidTransition {
        /// Stage the transition was attempted on.
        stage: StageIdentifier,
        /// Declared source state of the attempted transition.
        from: StageState,
        /// Declared target state of the attempted transition.
        to: StageState,
    },
    /// `NOT_STARTED -> RUNNING` was attempted while a direct predecessor was
    /// neither `PASSED` nor covered by a valid waiver.
    #[error("cannot start stage: {0:?}")]
    Prerequisite(Vec<String>),
    /// An underlying ledger operation failed.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
    /// The transition's payload could not be hashed.
    #[error("failed to hash transition payload: {0}")]
    Hashing(#[from] HashError),
}

/// Validates and applies stage state transitions (spec §4.2).
pub struct StageMachine {
    ledger: Arc<dyn LedgerStore>,
    graph: PrerequisiteGraph,
    waivers: Arc<WaiverManager>,
    metadata: PipelineMetadata,
}

impl StageMachine {
    /// Creates a stage machine over `ledger`, validating transitions against
    /// `graph` and `waivers`.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        graph: PrerequisiteGraph,
        waivers: Arc<WaiverManager>,
        metadata: PipelineMetadata,
    ) -> Self {
        Self { ledger, graph, waivers, metadata }
    }

    /// Returns the current state of every stage in `run_id`: the `to` state
    /// of its most recent ledger entry, or `NOT_STARTED` if it has none.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the run does not exist or storage fails.
    pub fn get_states(&self, run_id: &RunId) -> Result<BTreeMap<StageIdentifier, StageState>, LedgerError> {
        let entries = self.ledger.entries(run_id)?;
        Ok(Self::derive_states(&entries))
    }

    /// Returns whether `stage` may start: every direct predecessor is
    /// `PASSED` or covered by a valid waiver scoped to it, and if not, the
    /// human-readable reasons each unsatisfied predecessor failed.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the run does not exist or storage fails.
    pub fn can_start(&self, run_id: &RunId, stage: StageIdentifier) -> Result<(bool, Vec<String>), LedgerError> {
        let states = self.get_states(run_id)?;
        Ok(self.can_start_given(&states, stage, Timestamp::now()))
    }

    /// Validates the `(from, to)` edge and, for `NOT_STARTED -> RUNNING`,
    /// the prerequisite precondition; appends one ledger entry; and on
    /// `RUNNING -> FAILED` cascades `NOT_STARTED -> BLOCKED` entries to
    /// every transitive dependent still `NOT_STARTED`, or on a transition
    /// into `PASSED`, cascades `BLOCKED -> NOT_STARTED` entries to every
    /// transitive dependent whose prerequisites are now satisfied.
    ///
    /// # Errors
    ///
    /// Returns [`StageMachineError::InvalidTransition`] if the edge is not
    /// allowed, [`StageMachineError::Prerequisite`] if a `RUNNING` start's
    /// prerequisites are unmet, or a wrapped [`LedgerError`]/[`HashError`]
    /// on an underlying failure. A failed transition leaves no ledger
    /// entry: either the whole step commits or nothing is observable.
    #[allow(clippy::too_many_arguments, reason = "mirrors the transition signature named in the spec")]
    pub fn transition(
        &self,
        run_id: &RunId,
        stage: StageIdentifier,
        target_state: StageState,
        payload: &serde_json::Value,
        artifact_refs: Vec<ContentAddress>,
        trust_context: TrustContext,
    ) -> Result<LedgerEntry, StageMachineError> {
        self.transition_with_hashes(run_id, stage, target_state, payload, String::new(), String::new(), artifact_refs, trust_context)
    }

    /// As [`Self::transition`], additionally recording `input_hash` and
    /// `output_hash` on the appended entry. Used by the orchestrator's
    /// `execute_stage`, which hashes a stage handler's input and output;
    /// plain `transition` calls leave both as the empty string.
    ///
    /// # Errors
    ///
    /// Same as [`Self::transition`].
    #[allow(clippy::too_many_arguments, reason = "mirrors the transition signature named in the spec, plus the two hash fields execute_stage needs")]
    pub fn transition_with_hashes(
        &self,
        run_id: &RunId,
        stage: StageIdentifier,
        target_state: StageState,
        payload: &serde_json::Value,
        input_hash: String,
        output_hash: String,
        artifact_refs: Vec<ContentAddress>,
        trust_context: TrustContext,
    ) -> Result<LedgerEntry, StageMachineError> {
        let entries = self.ledger.entries(run_id)?;
        let states = Self::derive_states(&entries);
        let from = states.get(&stage).copied().unwrap_or(StageState::NotStarted);
        if !is_allowed_transition(from, target_state) {
            return Err(StageMachineError::InvalidTransition { stage, from, to: target_state });
        }

        let mut waiver_refs = Vec::new();
        if target_state == StageState::Running || (from == StageState::Blocked && target_state == StageState::NotStarted) {
            let (ok, reasons) = self.can_start_given(&states, stage, Timestamp::now());
            if !ok {
                return Err(StageMachineError::Prerequisite(reasons));
            }
            waiver_refs = self.waiver_refs_for_start(&states, stage, Timestamp::now());
        }

        let entry = self.append_entry(
            run_id,
            stage,
            from,
            target_state,
            payload,
            input_hash,
            output_hash,
            artifact_refs,
            waiver_refs,
            &trust_context,
            entries.len(),
        )?;

        if target_state == StageState::Failed {
            self.cascade_block(run_id, stage, &trust_context)?;
        }
        if target_state == StageState::Passed {
            self.cascade_unblock(run_id, stage, &trust_context)?;
        }

        Ok(entry)
    }

    /// Derives every stage's current state from a run's full entry list.
    fn derive_states(entries: &[LedgerEntry]) -> BTreeMap<StageIdentifier, StageState> {
        let mut states = BTreeMap::new();
        for stage in ALL_STAGES {
            states.insert(stage, StageState::NotStarted);
        }
        for entry in entries {
            states.insert(entry.stage_id, entry.state_transition.to);
        }
        states
    }

    /// Evaluates the `can_start` precondition against an already-computed
    /// state snapshot.
    fn can_start_given(
        &self,
        states: &BTreeMap<StageIdentifier, StageState>,
        stage: StageIdentifier,
        now: Timestamp,
    ) -> (bool, Vec<String>) {
        let mut reasons = Vec::new();
        for &predecessor in self.graph.predecessors(stage) {
            let predecessor_state = states.get(&predecessor).copied().unwrap_or(StageState::NotStarted);
            if predecessor_state == StageState::Passed {
                continue;
            }
            if self.waivers.has_valid_waiver(&gate_scope(predecessor), now) {
                continue;
            }
            reasons.push(format!(
                "predecessor {predecessor} is {predecessor_state} and is not covered by a valid waiver"
            ));
        }
        (reasons.is_empty(), reasons)
    }

    /// Returns the content addresses of valid waivers covering any
    /// non-`PASSED` direct predecessor of `stage`, for use as `waiver_refs`
    /// on the entry that starts it.
    fn waiver_refs_for_start(
        &self,
        states: &BTreeMap<StageIdentifier, StageState>,
        stage: StageIdentifier,
        now: Timestamp,
    ) -> Vec<ContentAddress> {
        self.graph
            .predecessors(stage)
            .iter()
            .filter(|&&predecessor| states.get(&predecessor).copied().unwrap_or(StageState::NotStarted) != StageState::Passed)
            .filter_map(|&predecessor| self.waivers.find_valid_waiver(&gate_scope(predecessor), now))
            .collect()
    }

    /// Appends a single ledger entry recording `stage`'s `from -> target`
    /// transition.
    #[allow(clippy::too_many_arguments, reason = "internal helper mirroring the full entry shape")]
    fn append_entry(
        &self,
        run_id: &RunId,
        stage: StageIdentifier,
        from: StageState,
        target: StageState,
        payload: &serde_json::Value,
        input_hash: String,
        output_hash: String,
        artifact_refs: Vec<ContentAddress>,
        waiver_refs: Vec<ContentAddress>,
        trust_context: &TrustContext,
        sequence: usize,
    ) -> Result<LedgerEntry, StageMachineError> {
        let payload_hash = hash_canonical_json(payload)?;
        let draft = LedgerEntryDraft {
            entry_id: EntryId::new(format!("{run_id}-{stage}-{sequence}")),
            run_id: run_id.clone(),
            stage_id: stage,
            state_transition: StateTransition { from, to: target },
            timestamp_utc: Timestamp::now(),
            input_hash,
            output_hash,
            artifact_refs,
            pipeline_version: self.metadata.pipeline_version.clone(),
            schema_version: self.metadata.schema_version.clone(),
            toolchain_version: self.metadata.toolchain_version.clone(),
            ruleset_versions: self.metadata.ruleset_versions.clone(),
            waiver_refs,
            trust_context: trust_context.clone(),
            trust_context_version: TRUST_CONTEXT_VERSION.to_string(),
            payload_hash,
        };
        Ok(self.ledger.append(run_id, draft)?)
    }

    /// Appends `NOT_STARTED -> BLOCKED` entries to every transitive
    /// dependent of `failed_stage` that is currently `NOT_STARTED`.
    fn cascade_block(
        &self,
        run_id: &RunId,
        failed_stage: StageIdentifier,
        trust_context: &TrustContext,
    ) -> Result<(), StageMachineError> {
        let mut entries = self.ledger.entries(run_id)?;
        let mut states = Self::derive_states(&entries);
        let dependents = self.graph.transitive_dependents(failed_stage);
        let order = self.graph.topological_order().unwrap_or_default();
        let empty_payload = serde_json::json!({});

        for stage in order {
            if !dependents.contains(&stage) {
                continue;
            }
            let current = states.get(&stage).copied().unwrap_or(StageState::NotStarted);
            if current != StageState::NotStarted {
                continue;
            }
            let entry = self.append_entry(
                run_id,
                stage,
                StageState::NotStarted,
                StageState::Blocked,
                &empty_payload,
                String::new(),
                String::new(),
                Vec::new(),
                Vec::new(),
                trust_context,
                entries.len(),
            )?;
            states.insert(stage, StageState::Blocked);
            entries.push(entry);
        }
        Ok(())
    }

    /// Appends `BLOCKED -> NOT_STARTED` entries to every transitive
    /// dependent of `gating_stage` that is currently `BLOCKED` and whose
    /// prerequisites are now satisfied (spec §4.2: unblock is symmetric with
    /// cascade-block).
    ///
    /// `gating_stage` need not itself have just passed: the waiver-triggered
    /// caller ([`Self::unblock_after_waiver`]) passes the stage a newly
    /// registered waiver covers, not a stage that passed. Either way this
    /// only re-checks `gating_stage`'s dependents via
    /// [`Self::can_start_given`], which itself consults the Waiver Manager
    /// for any non-`PASSED` predecessor, so a waiver alone is enough to
    /// unblock a dependent without `gating_stage` ever running.
    fn cascade_unblock(
        &self,
        run_id: &RunId,
        gating_stage: StageIdentifier,
        trust_context: &TrustContext,
    ) -> Result<(), StageMachineError> {
        let mut entries = self.ledger.entries(run_id)?;
        let mut states = Self::derive_states(&entries);
        let dependents = self.graph.transitive_dependents(gating_stage);
        let order = self.graph.topological_order().unwrap_or_default();
        let empty_payload = serde_json::json!({});
        let now = Timestamp::now();

        for stage in order {
            if !dependents.contains(&stage) {
                continue;
            }
            let current = states.get(&stage).copied().unwrap_or(StageState::NotStarted);
            if current != StageState::Blocked {
                continue;
            }
            let (ok, _reasons) = self.can_start_given(&states, stage, now);
            if !ok {
                continue;
            }
            let entry = self.append_entry(
                run_id,
                stage,
                StageState::Blocked,
                StageState::NotStarted,
                &empty_payload,
                String::new(),
                String::new(),
                Vec::new(),
                Vec::new(),
                trust_context,
                entries.len(),
            )?;
            states.insert(stage, StageState::NotStarted);
            entries.push(entry);
        }
        Ok(())
    }

    /// Re-runs the unblock sweep for a stage whose gate a waiver now covers.
    ///
    /// Called by the orchestrator right after a waiver is registered, so
    /// Scenario 3 (a waiver unblocking downstream stages) goes through the
    /// same gated, dependents-aware path as a stage passing, instead of
    /// relying on a caller directly transitioning the blocked stage back to
    /// `NOT_STARTED` without that stage's gate actually having a waiver.
    pub fn unblock_after_waiver(
        &self,
        run_id: &RunId,
        waived_stage: StageIdentifier,
        trust_context: &TrustContext,
    ) -> Result<(), StageMachineError> {
        self.cascade_unblock(run_id, waived_stage, trust_context)
    }
}

/// The gate-lookup scope for a stage's own gate: the waiver registry keys
/// waivers by `(stage_id, gate_name)`, and the Stage Machine always looks up
/// the gate named after the stage itself.
fn gate_scope(stage: StageIdentifier) -> WaiverScope {
    WaiverScope { stage_id: stage, gate_name: stage.as_str().to_string() }
}
