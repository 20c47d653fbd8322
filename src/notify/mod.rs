//! Outbound notification collaborator.
//!
//! Fire-and-forget by contract: no delivery confirmation, no retry.
//! The runtime never learns whether a message arrived, and notification
//! failures are not surfaced distinctly anywhere upstream.

use std::sync::Mutex;
use tracing::info;

use crate::types::Contact;

/// Sends alerts to recipients and dials emergency services.
pub trait AlertDispatcher: Send + Sync {
    /// Dispatch an alert message to all recipients. Fire and forget.
    fn send(&self, recipients: &[Contact], subject: &str, body: &str);

    /// Place a direct emergency-services call.
    fn dial_emergency(&self, number: &str);
}

/// Dispatcher that only logs. Default for headless deployments where the
/// host platform wires in the real transport.
#[derive(Debug, Default)]
pub struct LogDispatcher;

impl AlertDispatcher for LogDispatcher {
    fn send(&self, recipients: &[Contact], subject: &str, body: &str) {
        info!(
            recipients = recipients.len(),
            subject,
            body_len = body.len(),
            "Alert dispatched"
        );
    }

    fn dial_emergency(&self, number: &str) {
        info!(number, "Emergency call placed");
    }
}

/// One captured outbound action, for assertions in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentAlert {
    Message {
        recipients: Vec<Contact>,
        subject: String,
        body: String,
    },
    EmergencyCall {
        number: String,
    },
}

/// Test double that records every outbound action.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<SentAlert>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentAlert> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl AlertDispatcher for RecordingDispatcher {
    fn send(&self, recipients: &[Contact], subject: &str, body: &str) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentAlert::Message {
                recipients: recipients.to_vec(),
                subject: subject.to_string(),
                body: body.to_string(),
            });
        }
    }

    fn dial_emergency(&self, number: &str) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentAlert::EmergencyCall {
                number: number.to_string(),
            });
        }
    }
}
