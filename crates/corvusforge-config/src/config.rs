// crates/corvusforge-config/src/config.rs
// ============================================================================
// Module: Corvusforge Configuration
// Description: Typed configuration loading and structural validation.
// Purpose: Provide a strict, fail-closed config source for the Production
// Guard; malformed or ambiguous configuration is rejected rather than
// silently defaulted.
// Dependencies: corvusforge-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file (or constructed directly) and
//! validated once via [`CorvusforgeConfig::validate`]. Validation here is
//! structural: malformed hex, empty storage paths, and an empty trust-key
//! set are rejected. Whether the *values* of the configured trust keys
//! satisfy a production deployment is the Production Guard's concern, not
//! this crate's.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Maximum configuration file size accepted by [`CorvusforgeConfig::load`].
const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum accepted length for a configured filesystem path string.
const MAX_PATH_LENGTH: usize = 4096;
/// Hex character length of a 32-byte Ed25519 public key.
const PUBLIC_KEY_HEX_LENGTH: usize = 64;

/// Deployment environment. The Production Guard enforces trust-key and
/// waiver-mode requirements only when this is [`Environment::Production`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// No trust-key or waiver-mode requirements; the guard passes
    /// unconditionally.
    #[default]
    Debug,
    /// The Production Guard requires every key in `required_trust_keys`,
    /// strict waiver mode, and a real crypto provider.
    Production,
}

/// A named trust-key role checked by the Production Guard in production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustKeyRole {
    /// Root public key plugins are trusted against.
    PluginTrustRoot,
    /// Public key waiver signatures are verified against.
    WaiverSigningKey,
    /// Public key ledger anchor signatures are verified against.
    AnchorSigningKey,
}

/// Default `required_trust_keys`: `{plugin_trust_root, waiver_signing_key}`,
/// matching the production default (spec §6).
fn default_required_trust_keys() -> BTreeSet<TrustKeyRole> {
    BTreeSet::from([TrustKeyRole::PluginTrustRoot, TrustKeyRole::WaiverSigningKey])
}

/// Corvusforge's top-level configuration, consumed by the Production Guard
/// at orchestrator construction (spec §6).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorvusforgeConfig {
    /// Deployment environment. Default `debug`.
    #[serde(default)]
    pub environment: Environment,
    /// Trust-key roles the Production Guard requires to be present and
    /// non-empty in production. Default `{plugin_trust_root,
    /// waiver_signing_key}`.
    #[serde(default = "default_required_trust_keys")]
    pub required_trust_keys: BTreeSet<TrustKeyRole>,
    /// Hex-encoded plugin trust root public key, or empty.
    #[serde(default)]
    pub plugin_trust_root_public_hex: String,
    /// Hex-encoded waiver signing public key, or empty.
    #[serde(default)]
    pub waiver_signing_key_public_hex: String,
    /// Hex-encoded anchor signing public key, or empty.
    #[serde(default)]
    pub anchor_signing_key_public_hex: String,
    /// Whether the Waiver Manager is required to run in strict mode.
    /// Forced to `true` whenever `environment` is `production`, regardless
    /// of the configured file value.
    #[serde(default)]
    pub require_waiver_signature: bool,
    /// Filesystem location of the Run Ledger's backing store.
    pub ledger_path: PathBuf,
    /// Filesystem location of the Artifact Store's backing directory.
    pub artifact_dir: PathBuf,
}

impl CorvusforgeConfig {
    /// Loads configuration from `path`, parses it as TOML, and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, exceeds the
    /// maximum size, is not valid UTF-8 or TOML, or fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let text =
            std::str::from_utf8(&bytes).map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(text)
    }

    /// Parses and validates configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML, or a validation
    /// error from [`Self::validate`].
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates structural invariants and normalizes environment-forced
    /// fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `required_trust_keys` is empty,
    /// any configured public-key hex string is non-empty but malformed, or
    /// `ledger_path`/`artifact_dir` is empty or exceeds the maximum length.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.required_trust_keys.is_empty() {
            return Err(ConfigError::Invalid("required_trust_keys must not be empty".to_string()));
        }
        validate_public_key_hex("plugin_trust_root_public_hex", &self.plugin_trust_root_public_hex)?;
        validate_public_key_hex("waiver_signing_key_public_hex", &self.waiver_signing_key_public_hex)?;
        validate_public_key_hex("anchor_signing_key_public_hex", &self.anchor_signing_key_public_hex)?;
        validate_path_field("ledger_path", &self.ledger_path)?;
        validate_path_field("artifact_dir", &self.artifact_dir)?;

        if self.environment == Environment::Production {
            self.require_waiver_signature = true;
        }
        Ok(())
    }

    /// Returns the configured public key hex for `role`, or empty if unset.
    #[must_use]
    pub fn trust_key_hex(&self, role: TrustKeyRole) -> &str {
        match role {
            TrustKeyRole::PluginTrustRoot => &self.plugin_trust_root_public_hex,
            TrustKeyRole::WaiverSigningKey => &self.waiver_signing_key_public_hex,
            TrustKeyRole::AnchorSigningKey => &self.anchor_signing_key_public_hex,
        }
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading the configuration file.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Structurally invalid configuration.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Validates that `value` is either empty or exactly
/// [`PUBLIC_KEY_HEX_LENGTH`] lowercase hex characters.
fn validate_public_key_hex(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Ok(());
    }
    if value.len() != PUBLIC_KEY_HEX_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} must be {PUBLIC_KEY_HEX_LENGTH} hex characters")));
    }
    if !value.chars().all(|ch| ch.is_ascii_hexdigit()) || value.chars().any(|ch| ch.is_ascii_uppercase()) {
        return Err(ConfigError::Invalid(format!("{field} must be lowercase hex")));
    }
    Ok(())
}

/// Validates a configured storage path is non-empty and within the maximum
/// accepted length.
fn validate_path_field(field: &str, value: &Path) -> Result<(), ConfigError> {
    let text = value.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if text.len() > MAX_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test assertions use unwrap for brevity")]
    use super::*;

    fn valid_toml() -> &'static str {
        r#"
        environment = "debug"
        ledger_path = "./ledger.sqlite"
        artifact_dir = "./artifacts"
        "#
    }

    #[test]
    fn defaults_to_debug_environment_with_default_trust_keys() {
        let config = CorvusforgeConfig::from_toml_str(valid_toml()).unwrap();
        assert_eq!(config.environment, Environment::Debug);
        assert!(config.required_trust_keys.contains(&TrustKeyRole::PluginTrustRoot));
        assert!(config.required_trust_keys.contains(&TrustKeyRole::WaiverSigningKey));
        assert!(!config.require_waiver_signature);
    }

    #[test]
    fn production_environment_forces_waiver_signature_requirement() {
        let text = r#"
        environment = "production"
        ledger_path = "./ledger.sqlite"
        artifact_dir = "./artifacts"
        "#;
        let config = CorvusforgeConfig::from_toml_str(text).unwrap();
        assert!(config.require_waiver_signature);
    }

    #[test]
    fn empty_required_trust_keys_is_rejected() {
        let text = r#"
        ledger_path = "./ledger.sqlite"
        artifact_dir = "./artifacts"
        required_trust_keys = []
        "#;
        let result = CorvusforgeConfig::from_toml_str(text);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn malformed_public_key_hex_is_rejected() {
        let text = r#"
        ledger_path = "./ledger.sqlite"
        artifact_dir = "./artifacts"
        plugin_trust_root_public_hex = "not-hex"
        "#;
        let result = CorvusforgeConfig::from_toml_str(text);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn uppercase_public_key_hex_is_rejected() {
        let key = "A".repeat(PUBLIC_KEY_HEX_LENGTH);
        let text = format!(
            "ledger_path = \"./ledger.sqlite\"\nartifact_dir = \"./artifacts\"\nplugin_trust_root_public_hex = \"{key}\"\n"
        );
        let result = CorvusforgeConfig::from_toml_str(&text);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn empty_ledger_path_is_rejected() {
        let text = r#"
        ledger_path = ""
        artifact_dir = "./artifacts"
        "#;
        let result = CorvusforgeConfig::from_toml_str(text);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corvusforge.toml");
        fs::write(&path, valid_toml()).unwrap();
        let config = CorvusforgeConfig::load(&path).unwrap();
        assert_eq!(config.environment, Environment::Debug);
    }

    #[test]
    fn trust_key_hex_reads_the_configured_field() {
        let key = "a".repeat(PUBLIC_KEY_HEX_LENGTH);
        let text = format!(
            "ledger_path = \"./ledger.sqlite\"\nartifact_dir = \"./artifacts\"\nwaiver_signing_key_public_hex = \"{key}\"\n"
        );
        let config = CorvusforgeConfig::from_toml_str(&text).unwrap();
        assert_eq!(config.trust_key_hex(TrustKeyRole::WaiverSigningKey), key);
    }
}
