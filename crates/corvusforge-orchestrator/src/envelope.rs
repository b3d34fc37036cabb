// crates/corvusforge-orchestrator/src/envelope.rs
// ============================================================================
// Module: Envelope Validator
// Description: Rejects malformed inbound messages before they reach the
// ledger or any dispatched sink.
// Purpose: Give the orchestrator a single fail-closed parse-and-check step
// for every envelope it accepts from outside the process.
// Dependencies: corvusforge-core, serde_json
// ============================================================================

//! ## Overview
//! [`EnvelopeValidator::validate`] parses raw bytes as JSON and rejects
//! anything that is not a well-formed [`Envelope`](corvusforge_core::Envelope):
//! non-object JSON, a missing or unrecognized `envelope_kind`, a missing
//! base field, a `payload_hash` that does not match the payload, or a
//! `schema_version` outside the accepted set. Non-object JSON (arrays,
//! scalars) is rejected before any field is accessed.

use std::collections::BTreeSet;

use corvusforge_core::Envelope;
use corvusforge_core::EnvelopeId;
use corvusforge_core::EnvelopeKind;
use corvusforge_core::RunId;
use corvusforge_core::Timestamp;
use corvusforge_core::canonical_bytes;
use corvusforge_core::sha256_hex;
use serde_json::Value;
use thiserror::Error;

/// Errors raised while validating a raw envelope.
#[derive(Debug, Error)]
pub enum EnvelopeValidationError {
    /// The input was not valid JSON at all.
    #[error("envelope is not valid json: {0}")]
    Malformed(String),
    /// The parsed JSON value was not an object.
    #[error("envelope must be a json object, not {0}")]
    NotAnObject(&'static str),
    /// A required base field was missing or the wrong JSON type.
    #[error("envelope is missing required field {0}")]
    MissingField(String),
    /// `envelope_kind` was missing or not one of the six defined kinds.
    #[error("envelope_kind {0:?} is not one of the six defined kinds")]
    UnknownEnvelopeKind(String),
    /// `payload_hash` did not match `sha256_hex(canonical_bytes(payload))`.
    #[error("payload_hash does not match the envelope's payload")]
    PayloadHashMismatch,
    /// `schema_version` was outside the validator's accepted set.
    #[error("schema_version {0:?} is not accepted")]
    UnsupportedSchemaVersion(String),
}

/// Validates raw envelope bytes against the fixed base-field shape and a
/// configured set of accepted schema versions (spec §4.7).
pub struct EnvelopeValidator {
    accepted_schema_versions: BTreeSet<String>,
}

impl EnvelopeValidator {
    /// Creates a validator accepting exactly `accepted_schema_versions`.
    #[must_use]
    pub fn new(accepted_schema_versions: BTreeSet<String>) -> Self {
        Self { accepted_schema_versions }
    }

    /// Creates a validator accepting only schema version `"1"`.
    #[must_use]
    pub fn with_default_schema_versions() -> Self {
        Self::new(BTreeSet::from(["1".to_string()]))
    }

    /// Parses and validates `bytes` as an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeValidationError`] if `bytes` is not valid JSON, is
    /// not a JSON object, is missing a required base field, has an
    /// unrecognized `envelope_kind`, has a `payload_hash` that does not
    /// match its `payload`, or has a `schema_version` outside the accepted
    /// set.
    pub fn validate(&self, bytes: &[u8]) -> Result<Envelope, EnvelopeValidationError> {
        let parsed: Value =
            serde_json::from_slice(bytes).map_err(|err| EnvelopeValidationError::Malformed(err.to_string()))?;
        let object = match &parsed {
            Value::Object(object) => object,
            other => return Err(EnvelopeValidationError::NotAnObject(json_type_name(other))),
        };

        let envelope_id = required_string(object, "envelope_id")?;
        let run_id = required_string(object, "run_id")?;
        let source_node_id = required_string(object, "source_node_id")?;
        let destination_node_id = required_string(object, "destination_node_id")?;
        let envelope_kind_raw = required_string(object, "envelope_kind")?;
        let payload_hash = required_string(object, "payload_hash")?;
        let timestamp_raw = required_string(object, "timestamp_utc")?;
        let schema_version = required_string(object, "schema_version")?;
        let payload =
            object.get("payload").cloned().ok_or_else(|| EnvelopeValidationError::MissingField("payload".to_string()))?;

        let envelope_kind = EnvelopeKind::from_str_opt(&envelope_kind_raw)
            .ok_or(EnvelopeValidationError::UnknownEnvelopeKind(envelope_kind_raw))?;

        let expected_payload_hash =
            canonical_bytes(&payload).map(|bytes| sha256_hex(&bytes)).unwrap_or_default();
        if payload_hash != expected_payload_hash {
            return Err(EnvelopeValidationError::PayloadHashMismatch);
        }

        if !self.accepted_schema_versions.contains(&schema_version) {
            return Err(EnvelopeValidationError::UnsupportedSchemaVersion(schema_version));
        }

        let timestamp_utc = Timestamp::parse(&timestamp_raw)
            .map_err(|_| EnvelopeValidationError::MissingField("timestamp_utc".to_string()))?;

        Ok(Envelope {
            envelope_id: EnvelopeId::new(envelope_id),
            run_id: RunId::new(run_id),
            source_node_id,
            destination_node_id,
            envelope_kind,
            payload_hash,
            timestamp_utc,
            schema_version,
            payload,
        })
    }
}

/// Extracts a required string field from a parsed JSON object.
fn required_string(
    object: &serde_json::Map<String, Value>,
    field: &str,
) -> Result<String, EnvelopeValidationError> {
    match object.get(field) {
        Some(Value::String(value)) => Ok(value.clone()),
        _ => Err(EnvelopeValidationError::MissingField(field.to_string())),
    }
}

/// Returns a human-readable name for a JSON value's type, for error
/// messages.
const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test assertions use unwrap for brevity")]
    use super::*;

    fn sample_envelope_json() -> serde_json::Value {
        let payload = serde_json::json!({"k": "v"});
        let payload_hash = sha256_hex(&canonical_bytes(&payload).unwrap());
        serde_json::json!({
            "envelope_id": "env-1",
            "run_id": "run-1",
            "source_node_id": "a",
            "destination_node_id": "b",
            "envelope_kind": "Event",
            "payload_hash": payload_hash,
            "timestamp_utc": Timestamp::now().to_string(),
            "schema_version": "1",
            "payload": payload,
        })
    }

    #[test]
    fn valid_envelope_is_accepted() {
        let validator = EnvelopeValidator::with_default_schema_versions();
        let bytes = serde_json::to_vec(&sample_envelope_json()).unwrap();
        let envelope = validator.validate(&bytes).unwrap();
        assert_eq!(envelope.envelope_kind, EnvelopeKind::Event);
    }

    #[test]
    fn non_object_json_array_is_rejected() {
        let validator = EnvelopeValidator::with_default_schema_versions();
        let result = validator.validate(b"[1,2,3]");
        assert!(matches!(result, Err(EnvelopeValidationError::NotAnObject(_))));
    }

    #[test]
    fn non_object_json_scalar_is_rejected() {
        let validator = EnvelopeValidator::with_default_schema_versions();
        let result = validator.validate(b"42");
        assert!(matches!(result, Err(EnvelopeValidationError::NotAnObject(_))));
    }

    #[test]
    fn missing_envelope_kind_is_rejected() {
        let validator = EnvelopeValidator::with_default_schema_versions();
        let mut json = sample_envelope_json();
        json.as_object_mut().unwrap().remove("envelope_kind");
        let bytes = serde_json::to_vec(&json).unwrap();
        assert!(matches!(validator.validate(&bytes), Err(EnvelopeValidationError::MissingField(_))));
    }

    #[test]
    fn unrecognized_envelope_kind_is_rejected() {
        let validator = EnvelopeValidator::with_default_schema_versions();
        let mut json = sample_envelope_json();
        json["envelope_kind"] = serde_json::json!("NotAKind");
        let bytes = serde_json::to_vec(&json).unwrap();
        assert!(matches!(validator.validate(&bytes), Err(EnvelopeValidationError::UnknownEnvelopeKind(_))));
    }

    #[test]
    fn mismatched_payload_hash_is_rejected() {
        let validator = EnvelopeValidator::with_default_schema_versions();
        let mut json = sample_envelope_json();
        json["payload_hash"] = serde_json::json!("0".repeat(64));
        let bytes = serde_json::to_vec(&json).unwrap();
        assert!(matches!(validator.validate(&bytes), Err(EnvelopeValidationError::PayloadHashMismatch)));
    }

    #[test]
    fn schema_version_outside_accepted_set_is_rejected() {
        let validator = EnvelopeValidator::with_default_schema_versions();
        let mut json = sample_envelope_json();
        json["schema_version"] = serde_json::json!("99");
        let bytes = serde_json::to_vec(&json).unwrap();
        assert!(matches!(validator.validate(&bytes), Err(EnvelopeValidationError::UnsupportedSchemaVersion(_))));
    }
}
