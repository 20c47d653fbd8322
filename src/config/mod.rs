//! Runtime Configuration
//!
//! Operator-tunable timing and escalation values loaded from a TOML file,
//! replacing hardcoded durations.
//!
//! ## Loading Order
//!
//! 1. `AURA_CONFIG` environment variable (path to TOML file)
//! 2. `aura_sentinel.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! // In main():
//! config::init(RuntimeConfig::load());
//!
//! // Anywhere in the codebase:
//! let secs = config::get().timers.sos_countdown_secs;
//! ```

pub mod defaults;

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Global runtime configuration, initialized once at startup.
static RUNTIME_CONFIG: OnceLock<RuntimeConfig> = OnceLock::new();

/// Initialize the global runtime configuration.
///
/// Should be called exactly once before any calls to `get()`; a repeated
/// call is ignored with a warning.
pub fn init(config: RuntimeConfig) {
    if RUNTIME_CONFIG.set(config).is_err() {
        warn!("config::init() called more than once — ignoring");
    }
}

/// Get a reference to the global runtime configuration.
///
/// Falls back to built-in defaults when `init()` was never called, so
/// library consumers and tests never need a config file.
pub fn get() -> &'static RuntimeConfig {
    RUNTIME_CONFIG.get_or_init(RuntimeConfig::default)
}

// ============================================================================
// Config Schema
// ============================================================================

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub timers: TimerConfig,
    pub alert: AlertConfig,
}

/// Timing tunables for the duty cycle and countdowns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    pub duty_cycle_secs: u64,
    pub sos_countdown_secs: u32,
    pub panic_countdown_secs: u32,
    pub risk_review_secs: u32,
    pub manual_recording_cap_secs: u64,
    pub zone_event_clear_secs: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            duty_cycle_secs: defaults::DUTY_CYCLE_SECS,
            sos_countdown_secs: defaults::SOS_COUNTDOWN_SECS,
            panic_countdown_secs: defaults::PANIC_COUNTDOWN_SECS,
            risk_review_secs: defaults::RISK_REVIEW_SECS,
            manual_recording_cap_secs: defaults::MANUAL_RECORDING_CAP_SECS,
            zone_event_clear_secs: defaults::ZONE_EVENT_CLEAR_SECS,
        }
    }
}

/// Escalation action tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Number dialed by the emergency-services fallback.
    pub emergency_number: String,
    /// Application name embedded in alert messages.
    pub app_name: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            emergency_number: defaults::EMERGENCY_NUMBER.to_string(),
            app_name: defaults::APP_NAME.to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration following the documented loading order.
    /// Malformed files fall back to defaults with a warning; a missing
    /// file is not an error.
    pub fn load() -> Self {
        let path = std::env::var("AURA_CONFIG")
            .unwrap_or_else(|_| "aura_sentinel.toml".to_string());

        match std::fs::read_to_string(&path) {
            Ok(raw) => match toml::from_str::<RuntimeConfig>(&raw) {
                Ok(cfg) => {
                    info!(path = %path, "Runtime config loaded");
                    cfg
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "Malformed config file — using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                info!(path = %path, "No config file found — using defaults");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.timers.duty_cycle_secs, defaults::DUTY_CYCLE_SECS);
        assert_eq!(cfg.timers.sos_countdown_secs, defaults::SOS_COUNTDOWN_SECS);
        assert_eq!(cfg.timers.panic_countdown_secs, defaults::PANIC_COUNTDOWN_SECS);
        assert_eq!(cfg.alert.emergency_number, defaults::EMERGENCY_NUMBER);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let cfg: RuntimeConfig =
            toml::from_str("[timers]\nsos_countdown_secs = 8\n").unwrap();
        assert_eq!(cfg.timers.sos_countdown_secs, 8);
        assert_eq!(cfg.timers.panic_countdown_secs, defaults::PANIC_COUNTDOWN_SECS);
        assert_eq!(cfg.alert.app_name, defaults::APP_NAME);
    }
}
