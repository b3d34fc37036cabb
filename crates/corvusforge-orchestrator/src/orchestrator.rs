// crates/corvusforge-orchestrator/src/orchestrator.rs
// ============================================================================
// Module: Orchestrator
// Description: Thin composition root wiring the Run Ledger, Stage Machine,
// Crypto Bridge, Waiver Manager, Artifact Store, Sink Dispatcher, and
// Production Guard into a single entry point.
// Purpose: Give a caller one place to start a run, drive a stage to
// completion, and inspect or verify the resulting chain, without reaching
// into any satellite crate directly.
// Dependencies: corvusforge-core, corvusforge-crypto, corvusforge-store,
// corvusforge-waivers, corvusforge-broker, corvusforge-config
// ============================================================================

//! ## Overview
//! [`Orchestrator`] holds the trait objects and components every run shares:
//! a [`LedgerStore`], an [`ArtifactStoreApi`], a [`ProviderChain`], a
//! [`WaiverManager`], a [`StageMachine`], and a [`SinkDispatcher`]. It is
//! deliberately thin (spec §4.11): [`Orchestrator::new`] runs the
//! [`ProductionGuard`] exactly once and wires the above together; every
//! operation after that delegates to the component that owns it.

use std::sync::Arc;

use corvusforge_config::CorvusforgeConfig;
use corvusforge_core::ArtifactError;
use corvusforge_core::ArtifactStoreApi;
use corvusforge_core::ContentAddress;
use corvusforge_core::Envelope;
use corvusforge_core::HashError;
use corvusforge_core::LedgerAnchor;
use corvusforge_core::LedgerEntry;
use corvusforge_core::LedgerError;
use corvusforge_core::LedgerStore;
use corvusforge_core::PrerequisiteGraph;
use corvusforge_core::RunId;
use corvusforge_core::StageIdentifier;
use corvusforge_core::StageState;
use corvusforge_core::TrustContext;
use corvusforge_core::hash_canonical_json;
use corvusforge_crypto::ProviderChain;
use corvusforge_crypto::ProviderChainOptions;
use corvusforge_crypto::compute_trust_context;
use corvusforge_store::FilesystemArtifactStore;
use corvusforge_store::SqliteLedgerStore;
use corvusforge_waivers::RegisteredWaiver;
use corvusforge_waivers::WaiverError;
use corvusforge_waivers::WaiverManager;
use corvusforge_waivers::WaiverMode;
use rand::RngCore;
use rand::rngs::OsRng;
use serde_json::Value;
use thiserror::Error;

use crate::guard::ProductionGuard;
use crate::guard::ProductionGuardError;
use crate::stage_machine::PipelineMetadata;
use crate::stage_machine::StageMachine;
use crate::stage_machine::StageMachineError;

/// Number of random bytes used to derive a generated run identifier.
const RUN_ID_RANDOM_BYTES: usize = 16;

/// Errors raised while constructing or driving an [`Orchestrator`].
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The Production Guard rejected the active configuration.
    #[error(transparent)]
    Guard(#[from] ProductionGuardError),
    /// A Stage Machine transition failed.
    #[error(transparent)]
    StageMachine(#[from] StageMachineError),
    /// A ledger operation failed outside of a stage transition (e.g.
    /// `create_run`, `verify_chain`, `export_anchor`).
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// Opening the filesystem artifact store failed during bootstrap.
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    /// A payload could not be canonicalized for hashing.
    #[error(transparent)]
    Hashing(#[from] HashError),
    /// Waiver registration failed.
    #[error(transparent)]
    Waiver(#[from] WaiverError),
}

/// A pluggable stage body, invoked by [`Orchestrator::execute_stage`] once
/// the Stage Machine has admitted the `NOT_STARTED -> RUNNING` transition.
///
/// Stage handlers are opaque to the orchestrator (spec §5): they may take
/// arbitrary time, but must not re-enter the orchestrator for the same run.
/// A handler that returns `Err` still produces a recorded `FAILED`
/// transition; the error message becomes part of the entry's output
/// payload rather than aborting the call.
pub trait StageHandler: Send + Sync {
    /// Executes `stage` for `run_id` against `input`, returning the value
    /// recorded as the stage's output payload, or an error message recorded
    /// in place of one.
    fn handle(&self, run_id: &RunId, stage: StageIdentifier, input: &Value) -> Result<Value, String>;
}

/// The thin composition root over every Corvusforge component (spec §4.11).
pub struct Orchestrator {
    ledger: Arc<dyn LedgerStore>,
    artifacts: Arc<dyn ArtifactStoreApi>,
    crypto: ProviderChain,
    waivers: Arc<WaiverManager>,
    stage_machine: StageMachine,
    config: CorvusforgeConfig,
}

impl Orchestrator {
    /// Composes an orchestrator over already-constructed `ledger` and
    /// `artifacts` trait objects, probing the crypto provider chain per
    /// `crypto_options` and running the Production Guard once against
    /// `config` and `waiver_mode` before returning.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Guard`] if `config.environment` is
    /// `production` and any Production Guard condition is unmet.
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        artifacts: Arc<dyn ArtifactStoreApi>,
        crypto_options: ProviderChainOptions,
        waiver_mode: WaiverMode,
        config: CorvusforgeConfig,
        metadata: PipelineMetadata,
    ) -> Result<Self, OrchestratorError> {
        let crypto = ProviderChain::probe(crypto_options);
        ProductionGuard::evaluate(&config, waiver_mode, crypto.is_real_provider())?;

        let waivers = Arc::new(WaiverManager::new(waiver_mode, crypto.provider(), artifacts.clone()));
        let graph = PrerequisiteGraph::linear_default();
        let stage_machine = StageMachine::new(ledger.clone(), graph, waivers.clone(), metadata);

        Ok(Self { ledger, artifacts, crypto, waivers, stage_machine, config })
    }

    /// Builds an orchestrator from `config` alone, opening the `SQLite`
    /// ledger at `config.ledger_path` and the filesystem artifact store at
    /// `config.artifact_dir`. Prefer [`Self::new`] when the ledger and
    /// artifact store are already open (tests, embedding callers sharing a
    /// store across instances).
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Ledger`] or [`OrchestratorError::Artifact`]
    /// if either backing store fails to open, or [`OrchestratorError::Guard`]
    /// as in [`Self::new`].
    pub fn bootstrap(
        config: CorvusforgeConfig,
        crypto_options: ProviderChainOptions,
        waiver_mode: WaiverMode,
        metadata: PipelineMetadata,
    ) -> Result<Self, OrchestratorError> {
        let ledger: Arc<dyn LedgerStore> = Arc::new(SqliteLedgerStore::open(&config.ledger_path)?);
        let artifacts: Arc<dyn ArtifactStoreApi> = Arc::new(FilesystemArtifactStore::open(&config.artifact_dir)?);
        Self::new(ledger, artifacts, crypto_options, waiver_mode, config, metadata)
    }

    /// Returns the name of the selected crypto provider tier.
    #[must_use]
    pub fn crypto_provider_name(&self) -> &'static str {
        self.crypto.provider_name()
    }

    /// Returns the waiver manager shared by this orchestrator's Stage
    /// Machine, for callers that need to register waivers directly.
    #[must_use]
    pub fn waivers(&self) -> &Arc<WaiverManager> {
        &self.waivers
    }

    /// Registers `waiver` and re-runs the unblock sweep for `run_id` rooted
    /// at the stage the waiver's scope covers (spec §4.5 Scenario 3: a
    /// waiver can unblock a stage's downstream dependents without the
    /// waived stage ever passing).
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Waiver`] if registration itself fails
    /// (signature invalid in strict mode, storage error), or a wrapped
    /// [`StageMachineError`] if the unblock sweep fails to append a ledger
    /// entry.
    pub fn register_waiver(
        &self,
        run_id: &RunId,
        waiver: corvusforge_core::WaiverArtifact,
    ) -> Result<RegisteredWaiver, OrchestratorError> {
        let waived_stage = waiver.scope.stage_id;
        let registered = self.waivers.register_waiver(waiver)?;
        let trust_context = self.trust_context();
        self.stage_machine.unblock_after_waiver(run_id, waived_stage, &trust_context)?;
        Ok(registered)
    }

    /// Returns the artifact store shared by this orchestrator, for callers
    /// that need to `put`/`get` artifacts directly.
    #[must_use]
    pub fn artifacts(&self) -> &Arc<dyn ArtifactStoreApi> {
        &self.artifacts
    }

    /// Starts a new run: creates it in the ledger, then carries it through
    /// the intake stage's `NOT_STARTED -> RUNNING -> PASSED` pair with
    /// `prerequisites` (or an empty object) as the payload of both entries.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Ledger`] if the generated run identifier
    /// already exists (vanishingly unlikely; retried internally is not
    /// attempted, the caller may simply retry), or a wrapped
    /// [`StageMachineError`] if the intake transitions themselves fail.
    pub fn start_run(&self, prerequisites: Option<Value>) -> Result<RunId, OrchestratorError> {
        let run_id = RunId::new(generate_run_id());
        self.ledger.create_run(&run_id)?;

        let trust_context = self.trust_context();
        let payload = prerequisites.unwrap_or_else(|| serde_json::json!({}));

        self.stage_machine.transition(
            &run_id,
            StageIdentifier::S0Intake,
            StageState::Running,
            &payload,
            Vec::new(),
            trust_context.clone(),
        )?;
        self.stage_machine.transition(
            &run_id,
            StageIdentifier::S0Intake,
            StageState::Passed,
            &payload,
            Vec::new(),
            trust_context,
        )?;

        Ok(run_id)
    }

    /// Drives `stage` from `NOT_STARTED` to completion: validates the start
    /// via the Stage Machine, invokes `handler`, hashes `input` and the
    /// handler's output, and appends the final `PASSED`/`FAILED` transition
    /// carrying both hashes.
    ///
    /// # Errors
    ///
    /// Returns a wrapped [`StageMachineError`] if either transition is
    /// rejected (an unmet prerequisite, an invalid edge), or
    /// [`OrchestratorError::Hashing`] if `input` or the handler's output
    /// cannot be canonicalized.
    pub fn execute_stage(
        &self,
        run_id: &RunId,
        stage: StageIdentifier,
        input: &Value,
        handler: &dyn StageHandler,
    ) -> Result<LedgerEntry, OrchestratorError> {
        let trust_context = self.trust_context();

        self.stage_machine.transition(
            run_id,
            stage,
            StageState::Running,
            input,
            Vec::new(),
            trust_context.clone(),
        )?;

        let input_hash = hash_canonical_json(input)?;
        let (target_state, output) = match handler.handle(run_id, stage, input) {
            Ok(value) => (StageState::Passed, value),
            Err(message) => (StageState::Failed, serde_json::json!({ "error": message })),
        };
        let output_hash = hash_canonical_json(&output)?;

        let entry = self.stage_machine.transition_with_hashes(
            run_id,
            stage,
            target_state,
            &output,
            input_hash,
            output_hash,
            Vec::new(),
            trust_context,
        )?;

        Ok(entry)
    }

    /// Returns the current state of every stage in `run_id`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the run does not exist or storage fails.
    pub fn get_states(
        &self,
        run_id: &RunId,
    ) -> Result<std::collections::BTreeMap<StageIdentifier, StageState>, LedgerError> {
        self.stage_machine.get_states(run_id)
    }

    /// Returns every ledger entry recorded for `run_id`, in append order.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the run does not exist or storage fails.
    pub fn get_run_entries(&self, run_id: &RunId) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.ledger.entries(run_id)
    }

    /// Recomputes and checks every hash link in `run_id`'s chain.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ChainBroken`] at the first entry whose stored
    /// hash does not match its recomputed hash.
    pub fn verify_chain(&self, run_id: &RunId) -> Result<(), LedgerError> {
        self.ledger.verify_chain(run_id)
    }

    /// Exports a [`LedgerAnchor`] summarizing the current head of `run_id`'s
    /// chain.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::RunNotFound`] if the run does not exist.
    pub fn export_anchor(&self, run_id: &RunId) -> Result<LedgerAnchor, OrchestratorError> {
        Ok(self.ledger.export_anchor(run_id)?)
    }

    /// Stores `bytes` in the artifact store under `media_type`.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::Storage`] on an underlying failure.
    pub fn put_artifact(&self, bytes: &[u8], media_type: &str) -> Result<ContentAddress, OrchestratorError> {
        Ok(self.artifacts.put(bytes, media_type)?)
    }

    /// Dispatches `envelope` to every sink in `dispatcher`, isolating each
    /// sink's failure (spec §4.8). The dispatcher itself is not owned by
    /// the orchestrator: callers register whichever sinks they want an
    /// envelope fanned out to.
    ///
    /// # Errors
    ///
    /// Returns [`corvusforge_broker::SinkDispatchError`] only when every
    /// registered sink failed to deliver.
    pub fn dispatch(
        &self,
        dispatcher: &corvusforge_broker::SinkDispatcher,
        envelope: &Envelope,
    ) -> Result<corvusforge_broker::DispatchOutcome, corvusforge_broker::SinkDispatchError> {
        dispatcher.dispatch(envelope)
    }

    /// Computes the trust context sealed into every ledger entry this
    /// orchestrator appends, from the three public keys in its active
    /// configuration.
    fn trust_context(&self) -> TrustContext {
        compute_trust_context(
            non_empty(&self.config.plugin_trust_root_public_hex),
            non_empty(&self.config.waiver_signing_key_public_hex),
            non_empty(&self.config.anchor_signing_key_public_hex),
        )
    }
}

/// Maps an empty configured key string to `None`, as `compute_trust_context`
/// expects for an absent key.
fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() { None } else { Some(value) }
}

/// Generates a random run identifier, `"run-<32 hex chars>"`.
fn generate_run_id() -> String {
    let mut bytes = [0u8; RUN_ID_RANDOM_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let hex: String = bytes.iter().map(|byte| format!("{byte:02x}")).collect();
    format!("run-{hex}")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test assertions use unwrap for brevity")]
    use std::collections::BTreeSet;
    use std::path::PathBuf;
    use std::sync::Arc;

    use corvusforge_config::Environment;
    use corvusforge_config::TrustKeyRole;
    use corvusforge_core::StageIdentifier::*;
    use corvusforge_store::FilesystemArtifactStore;
    use corvusforge_store::SqliteLedgerStore;

    use super::*;

    struct EchoHandler;
    impl StageHandler for EchoHandler {
        fn handle(&self, _run_id: &RunId, _stage: StageIdentifier, input: &Value) -> Result<Value, String> {
            Ok(input.clone())
        }
    }

    struct AlwaysFailHandler;
    impl StageHandler for AlwaysFailHandler {
        fn handle(&self, _run_id: &RunId, _stage: StageIdentifier, _input: &Value) -> Result<Value, String> {
            Err("handler exploded".to_string())
        }
    }

    fn debug_config() -> CorvusforgeConfig {
        let mut config = CorvusforgeConfig {
            environment: Environment::Debug,
            required_trust_keys: BTreeSet::from([TrustKeyRole::PluginTrustRoot]),
            plugin_trust_root_public_hex: "a".repeat(64),
            waiver_signing_key_public_hex: String::new(),
            anchor_signing_key_public_hex: String::new(),
            require_waiver_signature: false,
            ledger_path: PathBuf::from("./ledger.sqlite"),
            artifact_dir: PathBuf::from("./artifacts"),
        };
        config.validate().unwrap();
        config
    }

    fn orchestrator() -> (Orchestrator, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let ledger: Arc<dyn LedgerStore> = Arc::new(SqliteLedgerStore::open_in_memory().unwrap());
        let artifacts: Arc<dyn ArtifactStoreApi> = Arc::new(FilesystemArtifactStore::open(dir.path()).unwrap());
        let metadata = PipelineMetadata {
            pipeline_version: "1.0.0".to_string(),
            toolchain_version: "1.92".to_string(),
            ruleset_versions: std::collections::BTreeMap::new(),
            schema_version: "1".to_string(),
        };
        let orchestrator = Orchestrator::new(
            ledger,
            artifacts,
            ProviderChainOptions { allow_extended: false },
            WaiverMode::Permissive,
            debug_config(),
            metadata,
        )
        .unwrap();
        (orchestrator, dir)
    }

    #[test]
    fn start_run_passes_intake_and_allows_the_next_stage_to_start() {
        let (orchestrator, _dir) = orchestrator();
        let run_id = orchestrator.start_run(Some(serde_json::json!({"ticket": "T-1"}))).unwrap();

        let states = orchestrator.get_states(&run_id).unwrap();
        assert_eq!(states[&S0Intake], StageState::Passed);

        let entries = orchestrator.get_run_entries(&run_id).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(orchestrator.verify_chain(&run_id).is_ok());

        let (ok, _reasons) = orchestrator.stage_machine.can_start(&run_id, S1Prerequisites).unwrap();
        assert!(ok);
    }

    #[test]
    fn execute_stage_records_input_and_output_hashes() {
        let (orchestrator, _dir) = orchestrator();
        let run_id = orchestrator.start_run(None).unwrap();

        let input = serde_json::json!({"check": "passes"});
        let entry = orchestrator.execute_stage(&run_id, S1Prerequisites, &input, &EchoHandler).unwrap();

        assert_eq!(entry.state_transition.to, StageState::Passed);
        assert!(!entry.input_hash.is_empty());
        assert!(!entry.output_hash.is_empty());
        assert_eq!(entry.input_hash, entry.output_hash);
    }

    #[test]
    fn a_failing_handler_records_a_failed_transition_not_an_error() {
        let (orchestrator, _dir) = orchestrator();
        let run_id = orchestrator.start_run(None).unwrap();

        let input = serde_json::json!({});
        let entry = orchestrator.execute_stage(&run_id, S1Prerequisites, &input, &AlwaysFailHandler).unwrap();

        assert_eq!(entry.state_transition.to, StageState::Failed);

        let states = orchestrator.get_states(&run_id).unwrap();
        assert_eq!(states[&S2Environment], StageState::Blocked);
    }

    #[test]
    fn production_guard_rejects_construction_with_permissive_waiver_mode() {
        let dir = tempfile::tempdir().unwrap();
        let ledger: Arc<dyn LedgerStore> = Arc::new(SqliteLedgerStore::open_in_memory().unwrap());
        let artifacts: Arc<dyn ArtifactStoreApi> = Arc::new(FilesystemArtifactStore::open(dir.path()).unwrap());
        let mut config = debug_config();
        config.environment = Environment::Production;
        config.waiver_signing_key_public_hex = "b".repeat(64);
        let metadata = PipelineMetadata {
            pipeline_version: "1.0.0".to_string(),
            toolchain_version: "1.92".to_string(),
            ruleset_versions: std::collections::BTreeMap::new(),
            schema_version: "1".to_string(),
        };

        let result = Orchestrator::new(
            ledger,
            artifacts,
            ProviderChainOptions { allow_extended: false },
            WaiverMode::Permissive,
            config,
            metadata,
        );
        assert!(matches!(result, Err(OrchestratorError::Guard(_))));
    }

    #[test]
    fn generated_run_ids_are_not_trivially_colliding() {
        let first = generate_run_id();
        let second = generate_run_id();
        assert_ne!(first, second);
        assert!(first.starts_with("run-"));
    }
}
