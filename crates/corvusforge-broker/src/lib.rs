// crates/corvusforge-broker/src/lib.rs
// ============================================================================
// Crate: corvusforge-broker
// Description: Sink Dispatcher: fan-out delivery of validated envelopes to a
// named registry of sinks, with per-sink failure isolation.
// Purpose: Let any number of delivery targets observe a run's envelopes
// without one broken sink blocking the others or the caller.
// Dependencies: corvusforge-core
// ============================================================================

//! # corvusforge-broker
//!
//! [`SinkDispatcher`] holds a named registry of [`Sink`](corvusforge_core::Sink)
//! implementations and fans an envelope out to every registered sink,
//! isolating each sink's failure from the others (spec §4.8). This crate also
//! ships two reference sinks: [`LogSink`], which writes one JSON record per
//! delivered envelope, and [`CallbackSink`], which invokes a caller-supplied
//! closure.

mod callback;
mod dispatcher;
mod log;

pub use callback::CallbackSink;
pub use dispatcher::DispatchOutcome;
pub use dispatcher::SinkDispatchError;
pub use dispatcher::SinkDispatcher;
pub use log::LogSink;
