//! User settings backed by the key-value store.
//!
//! Each settings family loads at startup and persists on every change.
//! Loads are best-effort: absent or malformed data falls back to defaults,
//! and a persisted sensitivity outside the known set is rejected rather
//! than trusted.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::signal::Signal;
use crate::storage::{keys, load_json, save_json, KeyValueStore};
use crate::types::{Contact, Sensitivity};

// ============================================================================
// AI detection settings
// ============================================================================

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct StoredAiSettings {
    sensitivity: Sensitivity,
}

/// Detection sensitivity, persisted across sessions.
pub struct AiSettings {
    store: Arc<dyn KeyValueStore>,
    sensitivity: Signal<Sensitivity>,
}

impl AiSettings {
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let stored: StoredAiSettings = load_json(store.as_ref(), keys::AI_SETTINGS);
        debug!(sensitivity = %stored.sensitivity, "AI settings loaded");
        Self {
            sensitivity: Signal::new(stored.sensitivity),
            store,
        }
    }

    pub fn sensitivity(&self) -> &Signal<Sensitivity> {
        &self.sensitivity
    }

    pub fn update_sensitivity(&self, sensitivity: Sensitivity) {
        self.sensitivity.set(sensitivity);
        save_json(
            self.store.as_ref(),
            keys::AI_SETTINGS,
            &StoredAiSettings { sensitivity },
        );
        info!(%sensitivity, "Detection sensitivity updated");
    }
}

// ============================================================================
// Fake call settings
// ============================================================================

/// Caller identity and script for the decoy-call surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FakeCallProfile {
    pub caller_name: String,
    pub caller_number: String,
    pub message: String,
}

impl Default for FakeCallProfile {
    fn default() -> Self {
        Self {
            caller_name: "Mom".to_string(),
            caller_number: "(555) 123-4567".to_string(),
            message: "Hey, I need you to come get me now, there's a situation here. Please hurry."
                .to_string(),
        }
    }
}

/// Fake-call settings, persisted across sessions.
pub struct FakeCallSettings {
    store: Arc<dyn KeyValueStore>,
    profile: Signal<FakeCallProfile>,
}

impl FakeCallSettings {
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let profile: FakeCallProfile = load_json(store.as_ref(), keys::FAKE_CALL_SETTINGS);
        Self {
            profile: Signal::new(profile),
            store,
        }
    }

    pub fn profile(&self) -> &Signal<FakeCallProfile> {
        &self.profile
    }

    pub fn update(&self, profile: FakeCallProfile) {
        save_json(self.store.as_ref(), keys::FAKE_CALL_SETTINGS, &profile);
        self.profile.set(profile);
    }
}

// ============================================================================
// Location-sharing session
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct StoredSharingState {
    is_sharing: bool,
    recipients: Vec<Contact>,
}

/// An active location-sharing session with chosen recipients.
///
/// Persisted so an in-progress session survives a restart; an inactive
/// stored state is not restored.
pub struct SharingSession {
    store: Arc<dyn KeyValueStore>,
    is_sharing: Signal<bool>,
    recipients: Signal<Vec<Contact>>,
}

impl SharingSession {
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let stored: StoredSharingState = load_json(store.as_ref(), keys::SHARING_STATE);
        // Only an active session is worth restoring.
        let (is_sharing, recipients) = if stored.is_sharing {
            info!(
                recipients = stored.recipients.len(),
                "Restoring active sharing session"
            );
            (true, stored.recipients)
        } else {
            (false, Vec::new())
        };
        Self {
            is_sharing: Signal::new(is_sharing),
            recipients: Signal::new(recipients),
            store,
        }
    }

    pub fn is_sharing(&self) -> &Signal<bool> {
        &self.is_sharing
    }

    pub fn recipients(&self) -> &Signal<Vec<Contact>> {
        &self.recipients
    }

    pub fn start(&self, recipients: Vec<Contact>) {
        self.is_sharing.set(true);
        self.recipients.set(recipients);
        self.persist();
        info!("Location sharing started");
    }

    pub fn stop(&self) {
        self.is_sharing.set(false);
        self.recipients.set(Vec::new());
        self.persist();
        info!("Location sharing stopped");
    }

    fn persist(&self) {
        save_json(
            self.store.as_ref(),
            keys::SHARING_STATE,
            &StoredSharingState {
                is_sharing: self.is_sharing.get(),
                recipients: self.recipients.get(),
            },
        );
    }
}
