//! Alert escalation session types.

use serde::{Deserialize, Serialize};

use super::Contact;

/// What started an escalation. At most one session may be active per
/// trigger family at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum AlertTrigger {
    /// Deliberate SOS activation from the home screen.
    Sos,
    /// Quick panic button (shorter countdown).
    Panic,
    /// AI-detected risk, confirmed or timed out of its review window.
    RiskConfirmed,
}

impl std::fmt::Display for AlertTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertTrigger::Sos => write!(f, "SOS"),
            AlertTrigger::Panic => write!(f, "panic"),
            AlertTrigger::RiskConfirmed => write!(f, "AI risk"),
        }
    }
}

/// Who the resolved action will reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertTarget {
    /// Explicit recipients exist; the action composes and dispatches an
    /// alert message to all of them.
    Contacts(Vec<Contact>),
    /// No recipients configured; the action dials emergency services
    /// directly instead.
    EmergencyServices,
}

impl AlertTarget {
    /// Human-readable description shown during the countdown.
    pub fn description(&self) -> String {
        match self {
            AlertTarget::Contacts(_) => "Your Emergency Contacts".to_string(),
            AlertTarget::EmergencyServices => "Emergency Services (911)".to_string(),
        }
    }
}

/// Transient state of one escalation instance. Destroyed on cancel,
/// completion, or the owning context's teardown.
#[derive(Debug, Clone)]
pub struct AlertSession {
    pub trigger: AlertTrigger,
    /// Seconds until the irreversible action fires.
    pub remaining: u32,
    pub target: AlertTarget,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

/// The irreversible action a completed countdown resolves to. The two
/// branches are mutually exclusive: never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedAction {
    /// Compose and dispatch an alert message to all recipients.
    NotifyContacts {
        recipients: Vec<Contact>,
        subject: String,
        body: String,
    },
    /// Dial emergency services directly.
    DialEmergency { number: String },
}
