// crates/corvusforge-orchestrator/src/guard.rs
// ============================================================================
// Module: Production Guard
// Description: Startup gate evaluated once at orchestrator construction,
// refusing to start a production deployment with missing trust keys,
// permissive waivers, or a fail-closed crypto provider.
// Purpose: Centralize what would otherwise be implicit global configuration
// state into one explicit, fail-closed check the orchestrator cannot skip.
// Dependencies: corvusforge-config, corvusforge-waivers
// ============================================================================

//! ## Overview
//! [`ProductionGuard::evaluate`] runs exactly once, during
//! [`crate::Orchestrator::new`]. In `debug`/`development` it passes
//! unconditionally. In `production` it requires every configured
//! [`TrustKeyRole`] to have non-empty key material, the waiver manager to be
//! running in [`WaiverMode::Strict`], and the selected crypto provider to be
//! a real backend (not the fail-closed terminal tier). Every violated
//! condition is collected and reported together, not just the first one
//! found, so an operator can fix a misconfigured deployment in one pass.

use corvusforge_config::CorvusforgeConfig;
use corvusforge_config::Environment;
use corvusforge_config::TrustKeyRole;
use corvusforge_waivers::WaiverMode;
use thiserror::Error;

/// Raised when a production deployment fails one or more startup
/// conditions.
#[derive(Debug, Error)]
#[error("production guard failed: {}", .missing.join("; "))]
pub struct ProductionGuardError {
    /// Human-readable description of every failed condition, in the order
    /// they were checked.
    pub missing: Vec<String>,
}

/// The startup gate evaluated once over the active configuration, waiver
/// mode, and crypto provider (spec §4.10).
pub struct ProductionGuard;

impl ProductionGuard {
    /// Checks `config` against the active `waiver_mode` and
    /// `crypto_is_real_provider`, refusing to pass a production deployment
    /// with any missing trust key, permissive waiver mode, or fail-closed
    /// crypto provider.
    ///
    /// In `debug`/`development`, always passes: no key requirement, and
    /// permissive waiver mode is allowed.
    ///
    /// # Errors
    ///
    /// Returns [`ProductionGuardError`] naming every failed condition when
    /// `config.environment` is [`Environment::Production`] and any of the
    /// three conditions in spec §4.10 is not met.
    pub fn evaluate(
        config: &CorvusforgeConfig,
        waiver_mode: WaiverMode,
        crypto_is_real_provider: bool,
    ) -> Result<(), ProductionGuardError> {
        if config.environment != Environment::Production {
            return Ok(());
        }

        let mut missing = Vec::new();

        for &role in &config.required_trust_keys {
            if config.trust_key_hex(role).is_empty() {
                missing.push(format!("required trust key {} is empty", role_name(role)));
            }
        }

        if waiver_mode != WaiverMode::Strict {
            missing.push("waiver manager must run in strict mode in production".to_string());
        }

        if !crypto_is_real_provider {
            missing.push("a real crypto provider must be selected in production, not the fail-closed tier".to_string());
        }

        if missing.is_empty() { Ok(()) } else { Err(ProductionGuardError { missing }) }
    }
}

/// Returns the wire-stable name of a trust key role, for error messages.
const fn role_name(role: TrustKeyRole) -> &'static str {
    match role {
        TrustKeyRole::PluginTrustRoot => "plugin_trust_root",
        TrustKeyRole::WaiverSigningKey => "waiver_signing_key",
        TrustKeyRole::AnchorSigningKey => "anchor_signing_key",
    }
}
