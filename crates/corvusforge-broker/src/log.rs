// crates/corvusforge-broker/src/log.rs
// ============================================================================
// Module: Log Sink
// Description: Writes one structured JSON record per delivered envelope.
// Purpose: Provide the audit-facing logging surface for dispatched envelopes
// without pulling in a logging framework.
// Dependencies: corvusforge-core, serde_json, std
// ============================================================================

//! ## Overview
//! `LogSink` is the hand-rolled structured-logging surface for dispatched
//! envelopes: one JSON object per line, written through
//! `serde_json::to_writer`. It never fails to parse its own output and never
//! delivers an envelope anywhere but the configured writer.

use std::io::Write;
use std::sync::Mutex;

use corvusforge_core::Envelope;
use corvusforge_core::Sink;
use corvusforge_core::SinkError;
use serde_json::json;

/// Writes a JSON log record for each envelope it is asked to deliver.
pub struct LogSink<W: Write + Send> {
    name: String,
    writer: Mutex<W>,
}

impl<W: Write + Send> LogSink<W> {
    /// Creates a log sink with the default registry name `"log"`.
    pub fn new(writer: W) -> Self {
        Self::with_name(writer, "log")
    }

    /// Creates a log sink registered under a caller-chosen name.
    pub fn with_name(writer: W, name: impl Into<String>) -> Self {
        Self { name: name.into(), writer: Mutex::new(writer) }
    }
}

impl<W: Write + Send> Sink for LogSink<W> {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, envelope: &Envelope) -> Result<(), SinkError> {
        let record = json!({
            "envelope_id": envelope.envelope_id,
            "run_id": envelope.run_id,
            "envelope_kind": envelope.envelope_kind,
            "source_node_id": envelope.source_node_id,
            "destination_node_id": envelope.destination_node_id,
            "payload_hash": envelope.payload_hash,
            "timestamp_utc": envelope.timestamp_utc,
        });
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| SinkError::DeliveryFailed(self.name.clone(), "log writer mutex poisoned".to_string()))?;
        serde_json::to_writer(&mut *guard, &record)
            .map_err(|err| SinkError::DeliveryFailed(self.name.clone(), err.to_string()))?;
        guard
            .write_all(b"\n")
            .map_err(|err| SinkError::DeliveryFailed(self.name.clone(), err.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test assertions use unwrap for brevity")]
    use corvusforge_core::EnvelopeId;
    use corvusforge_core::EnvelopeKind;
    use corvusforge_core::RunId;
    use corvusforge_core::Timestamp;

    use super::*;

    #[test]
    fn writes_one_json_line_per_envelope() {
        let sink = LogSink::new(Vec::new());
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
        let guard = sink.writer.lock().unwrap();
        let text = String::from_utf8(guard.clone()).unwrap();
        assert_eq!(text.lines().count(), 1);
        let parsed: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(parsed["envelope_id"], "env-1");
    }

    #[test]
    fn default_name_is_log() {
        let sink = LogSink::new(Vec::new());
        assert_eq!(sink.name(), "log");
    }
}
