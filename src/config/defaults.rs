//! Default timing and escalation constants.
//!
//! All tunables have a TOML override in `RuntimeConfig`; these constants
//! are the fallback values and the single place they are defined.

/// Duty-cycle period for auto audio monitoring: every tick the capture
/// segment is rotated and the closed segment submitted for analysis.
pub const DUTY_CYCLE_SECS: u64 = 5;

/// Countdown before an SOS (or AI-risk-confirmed) alert fires.
pub const SOS_COUNTDOWN_SECS: u32 = 5;

/// Countdown before a quick panic alert fires.
pub const PANIC_COUNTDOWN_SECS: u32 = 3;

/// Review window after an AI risk detection before it auto-escalates
/// into the SOS countdown.
pub const RISK_REVIEW_SECS: u32 = 10;

/// Hard ceiling on a manual recording; auto-finalized at this boundary.
pub const MANUAL_RECORDING_CAP_SECS: u64 = 10;

/// How long a fired zone event stays observable before auto-clearing.
pub const ZONE_EVENT_CLEAR_SECS: u64 = 5;

/// Mean Earth radius in meters, used by the haversine distance.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Emergency services number used by the fallback target.
pub const EMERGENCY_NUMBER: &str = "911";

/// Application name embedded in alert message bodies.
pub const APP_NAME: &str = "Aura Sentinel";
