// crates/corvusforge-broker/src/dispatcher.rs
// ============================================================================
// Module: Sink Dispatcher
// Description: Named registry of sinks with per-sink failure isolation.
// Purpose: Fan an envelope out to every registered sink without letting one
// broken sink prevent delivery to the others.
// Dependencies: corvusforge-core
// ============================================================================

//! ## Overview
//! [`SinkDispatcher::dispatch`] invokes every registered sink in isolation:
//! one sink's failure neither stops nor is hidden by another's. An empty
//! registry dispatches successfully with an empty result; only when every
//! registered sink fails does dispatch itself report an error. Failure
//! detail per sink is captured as structured data on
//! [`DispatchOutcome::failure_details`] rather than printed, matching the
//! rest of this workspace's hand-rolled structured logging.

use std::collections::BTreeMap;
use std::sync::Arc;

use corvusforge_core::Envelope;
use corvusforge_core::Sink;
use thiserror::Error;

/// Raised by [`SinkDispatcher::dispatch`] only when every registered sink
/// failed to deliver.
#[derive(Debug, Error)]
#[error("every sink failed to deliver envelope {envelope_id}: {failures:?}")]
pub struct SinkDispatchError {
    /// Identifier of the envelope that failed to deliver anywhere.
    pub envelope_id: String,
    /// Per-sink failure detail, keyed by sink name.
    pub failures: BTreeMap<String, String>,
}

/// The per-sink delivery result of a single [`SinkDispatcher::dispatch`]
/// call.
#[derive(Debug, Clone, Default)]
pub struct DispatchOutcome {
    /// Whether each registered sink (by name) delivered successfully.
    pub results: BTreeMap<String, bool>,
    /// Failure detail for every sink that reported `false` in `results`.
    pub failure_details: BTreeMap<String, String>,
}

/// Fans envelopes out to a named registry of sinks (spec §4.8).
///
/// # Invariants
/// - `dispatch` invokes every registered sink regardless of whether an
///   earlier sink in the registry failed.
/// - An empty registry is not an error: `dispatch` returns an empty outcome.
#[derive(Default)]
pub struct SinkDispatcher {
    sinks: BTreeMap<String, Arc<dyn Sink>>,
}

impl SinkDispatcher {
    /// Creates an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `sink` under its own [`Sink::name`], replacing any prior
    /// sink registered under the same name.
    pub fn register(&mut self, sink: Arc<dyn Sink>) {
        self.sinks.insert(sink.name().to_string(), sink);
    }

    /// Returns the number of registered sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Returns `true` if no sinks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Delivers `envelope` to every registered sink, isolating each sink's
    /// failure from the others.
    ///
    /// # Errors
    ///
    /// Returns [`SinkDispatchError`] only when the registry is non-empty and
    /// every registered sink failed to deliver.
    pub fn dispatch(&self, envelope: &Envelope) -> Result<DispatchOutcome, SinkDispatchError> {
        let mut outcome = DispatchOutcome::default();
        for (name, sink) in &self.sinks {
            match sink.write(envelope) {
                Ok(()) => {
                    outcome.results.insert(name.clone(), true);
                }
                Err(err) => {
                    outcome.results.insert(name.clone(), false);
                    outcome.failure_details.insert(name.clone(), err.to_string());
                }
            }
        }
        if !self.sinks.is_empty() && outcome.results.values().all(|delivered| !delivered) {
            return Err(SinkDispatchError {
                envelope_id: envelope.envelope_id.to_string(),
                failures: outcome.failure_details,
            });
        }
        Ok(outcome)
    }

    /// Applies [`Self::dispatch`] to every envelope in `envelopes`,
    /// continuing across the batch regardless of individual failures. Each
    /// envelope's outcome is reported independently; a per-envelope
    /// all-sinks failure does not stop the batch.
    #[must_use]
    pub fn batch_dispatch(&self, envelopes: &[Envelope]) -> Vec<Result<DispatchOutcome, SinkDispatchError>> {
        envelopes.iter().map(|envelope| self.dispatch(envelope)).collect()
    }
}
