// crates/corvusforge-broker/src/callback.rs
// ============================================================================
// Module: Callback Sink
// Description: Invokes a caller-supplied closure for each delivered envelope.
// Purpose: Let embedding callers observe dispatched envelopes without
// implementing the Sink trait themselves.
// Dependencies: corvusforge-core, std
// ============================================================================

//! ## Overview
//! `CallbackSink` wraps a `Fn(&Envelope) -> Result<(), SinkError>` closure as
//! a [`Sink`]. Useful for tests and for embedding callers that want to react
//! to dispatched envelopes in-process rather than through a standalone sink
//! implementation.

use std::sync::Arc;

use corvusforge_core::Envelope;
use corvusforge_core::Sink;
use corvusforge_core::SinkError;

/// Signature of the handler a [`CallbackSink`] invokes on delivery.
type CallbackHandler = dyn Fn(&Envelope) -> Result<(), SinkError> + Send + Sync;

/// A [`Sink`] that delegates delivery to a caller-supplied closure.
#[derive(Clone)]
pub struct CallbackSink {
    name: String,
    handler: Arc<CallbackHandler>,
}

impl CallbackSink {
    /// Creates a callback sink registered under `name`, invoking `handler`
    /// on every delivery.
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Envelope) -> Result<(), SinkError> + Send + Sync + 'static,
    {
        Self { name: name.into(), handler: Arc::new(handler) }
    }
}

impl Sink for CallbackSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, envelope: &Envelope) -> Result<(), SinkError> {
        (self.handler)(envelope)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test assertions use unwrap for brevity")]
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use corvusforge_core::EnvelopeId;
    use corvusforge_core::EnvelopeKind;
    use corvusforge_core::RunId;
    use corvusforge_core::Timestamp;

    use super::*;

    #[test]
    fn invokes_handler_on_write() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let sink = CallbackSink::new("counter", move |_envelope| {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let envelope = Envelope {
            envelope_id: EnvelopeId::new("env-1"),
            run_id: RunId::new("run-1"),
            source_node_id: "a".to_string(),
            destination_node_id: "b".to_string(),
            envelope_kind: EnvelopeKind::Event,
            payload_hash: corvusforge_core::sha256_hex(b"{}"),
            timestamp_utc: Timestamp::now(),
            schema_version: "1".to_string(),
            payload: serde_json::json!({}),
        };
        sink.write(&envelope).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(sink.name(), "counter");
    }
}
