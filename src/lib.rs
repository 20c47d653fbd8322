//! Aura Sentinel: Personal Safety Companion Runtime
//!
//! Watches a user's location and ambient audio, and orchestrates the
//! escalating alert workflows (panic SOS, AI-detected risk, geofence
//! entry/exit) that culminate in notifying emergency contacts or
//! emergency services.
//!
//! ## Architecture
//!
//! - **Location**: coordinate-source abstraction feeding a current-position observable
//! - **Geofence**: zone membership tracking with baseline-then-transition semantics
//! - **Audio**: duty-cycled record/classify pipeline with a manual-capture mode
//! - **Escalation**: cancellable countdown state machines in front of irreversible actions
//! - **Directory**: contact/group resolution with referential integrity

pub mod audio;
pub mod config;
pub mod directory;
pub mod escalation;
pub mod geofence;
pub mod location;
pub mod notify;
pub mod pipeline;
pub mod settings;
pub mod signal;
pub mod storage;
pub mod tips;
pub mod types;

// Re-export runtime configuration
pub use config::RuntimeConfig;

// Re-export commonly used types
pub use types::{
    AlertSession, AlertTarget, AlertTrigger, Contact, Coordinate, Group, ResolvedAction,
    RiskAssessment, RiskLevel, SafetyTip, SafetyZone, Sensitivity, ZoneEvent, ZoneTransition,
};

// Re-export subsystem entry points
pub use audio::{AudioPipeline, CaptureDevice, CaptureSession, PermissionState, RiskClassifier};
pub use directory::Directory;
pub use escalation::Escalation;
pub use geofence::{GeofenceEngine, GeofenceMonitor, ZoneDraft};
pub use location::{CoordinateSource, LocationTracker, WatchError};
pub use notify::AlertDispatcher;
pub use pipeline::SafetyPipeline;
pub use signal::Signal;
pub use storage::{KeyValueStore, MemoryStore, SledStore};
