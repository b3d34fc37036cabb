// crates/corvusforge-config/src/lib.rs
// ============================================================================
// Crate: corvusforge-config
// Description: Configuration loading and fail-closed validation consumed by
// the Production Guard.
// Purpose: Give the orchestrator a single typed source of truth for
// environment, trust-key material, and storage locations before it accepts
// any run.
// Dependencies: corvusforge-core, serde, toml, thiserror
// ============================================================================

//! # corvusforge-config
//!
//! [`CorvusforgeConfig`] is loaded from a TOML file (or built directly by an
//! embedding caller) and validated once before the orchestrator starts. A
//! `production` environment config with missing trust-key material, a
//! permissive waiver mode, or a disabled waiver signature requirement fails
//! [`CorvusforgeConfig::validate`]; the Production Guard (in
//! `corvusforge-orchestrator`) refuses to start on any such failure.

mod config;

pub use config::ConfigError;
pub use config::CorvusforgeConfig;
pub use config::Environment;
pub use config::TrustKeyRole;
