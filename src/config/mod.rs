//! PM Flex Configuration Module
//!
//! Classification thresholds, chronic scoring weights and severity tiers
//! loaded from TOML, replacing hardcoded pipeline constants with
//! operator-tunable values.
//!
//! ## Loading Order
//!
//! 1. `PM_FLEX_CONFIG` environment variable (path to TOML file)
//! 2. `pm_flex.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! config::init(PmFlexConfig::load()?);
//!
//! let overdue = config::get()?.pm_timing.overdue_threshold;
//! ```
//!
//! Library stages take `&PmFlexConfig` explicitly; the global exists for the
//! binary and for code paths that have no config threaded through.

mod pm_config;
pub mod defaults;
pub mod validation;

pub use pm_config::*;

use std::sync::OnceLock;

/// Global PM Flex configuration, initialized once at startup.
static PM_FLEX_CONFIG: OnceLock<PmFlexConfig> = OnceLock::new();

/// Initialize the global configuration.
///
/// Settings are immutable for the life of the process; a second call is
/// ignored with a warning.
pub fn init(config: PmFlexConfig) {
    if PM_FLEX_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Get a reference to the global configuration.
pub fn get() -> Result<&'static PmFlexConfig, ConfigError> {
    PM_FLEX_CONFIG.get().ok_or(ConfigError::NotInitialized)
}

/// Check whether the config has been initialized.
pub fn is_initialized() -> bool {
    PM_FLEX_CONFIG.get().is_some()
}
