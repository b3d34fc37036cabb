// crates/corvusforge-orchestrator/src/lib.rs
// ============================================================================
// Crate: corvusforge-orchestrator
// Description: Stage Machine, Envelope Validator, Production Guard, and the
// thin Orchestrator composition root.
// Purpose: The only crate in this workspace that wires the Run Ledger,
// Crypto Bridge, Waiver Manager, Artifact Store, and Sink Dispatcher
// together into something a caller can start a run against.
// ============================================================================

//! # corvusforge-orchestrator
//!
//! [`StageMachine`] validates and applies stage transitions against a
//! [`corvusforge_core::LedgerStore`]; [`EnvelopeValidator`] rejects
//! malformed inbound messages; [`ProductionGuard`] refuses to start a
//! production deployment with missing trust keys, permissive waivers, or a
//! fail-closed crypto provider; [`Orchestrator`] composes all of the above,
//! plus the Crypto Bridge and Sink Dispatcher, into the single entry point
//! described in spec §4.11.

mod envelope;
mod guard;
mod orchestrator;
mod stage_machine;

pub use envelope::EnvelopeValidationError;
pub use envelope::EnvelopeValidator;
pub use guard::ProductionGuard;
pub use guard::ProductionGuardError;
pub use orchestrator::Orchestrator;
pub use orchestrator::OrchestratorError;
pub use orchestrator::StageHandler;
pub use stage_machine::PipelineMetadata;
pub use stage_machine::StageMachine;
pub use stage_machine::StageMachineError;
