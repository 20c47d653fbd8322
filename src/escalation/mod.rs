//! Alert escalation state machine.
//!
//! Generic countdown → confirm/cancel → action engine, instantiated per
//! trigger family (panic, SOS, AI-risk-confirmed). Geofence alerts are
//! push-only and never pass through this countdown form.
//!
//! The machines here are deterministic tick-driven cores: `tick()` is
//! called once per second by an async driver, so tests can simulate time
//! without wall-clock waits. Timer arming/cancelling is the driver's
//! responsibility (see `pipeline`); a canceled countdown's timer is
//! removed, not merely ignored.

pub mod message;

use tracing::{debug, info};

use crate::config;
use crate::notify::AlertDispatcher;
use crate::types::{
    AlertSession, AlertTarget, AlertTrigger, Contact, Coordinate, ResolvedAction,
};

/// Countdown duration for a trigger, from runtime config.
fn countdown_secs(trigger: AlertTrigger) -> u32 {
    let timers = &config::get().timers;
    match trigger {
        AlertTrigger::Sos | AlertTrigger::RiskConfirmed => timers.sos_countdown_secs,
        AlertTrigger::Panic => timers.panic_countdown_secs,
    }
}

/// Compute the escalation target: explicit recipients when any exist,
/// else the emergency-services fallback designation.
pub fn resolve_target(contacts: &[Contact]) -> AlertTarget {
    if contacts.is_empty() {
        AlertTarget::EmergencyServices
    } else {
        AlertTarget::Contacts(contacts.to_vec())
    }
}

/// Compute the irreversible action for a resolved countdown.
///
/// The branches are mutually exclusive: a non-empty recipient list gets
/// the composed alert message, an empty one gets the direct
/// emergency-services call — never both.
pub fn resolve_action(
    target: &AlertTarget,
    coords: Option<Coordinate>,
    has_audio_clip: bool,
) -> ResolvedAction {
    match target {
        AlertTarget::Contacts(recipients) => ResolvedAction::NotifyContacts {
            recipients: recipients.clone(),
            subject: message::sos_subject(),
            body: message::sos_body(coords, has_audio_clip),
        },
        AlertTarget::EmergencyServices => ResolvedAction::DialEmergency {
            number: config::get().alert.emergency_number.clone(),
        },
    }
}

/// Execute a resolved action through the outbound collaborator.
pub fn execute(action: &ResolvedAction, dispatcher: &dyn AlertDispatcher) {
    match action {
        ResolvedAction::NotifyContacts {
            recipients,
            subject,
            body,
        } => {
            info!(recipients = recipients.len(), "Dispatching escalation alert");
            dispatcher.send(recipients, subject, body);
        }
        ResolvedAction::DialEmergency { number } => {
            info!(number = %number, "No recipients configured — dialing emergency services");
            dispatcher.dial_emergency(number);
        }
    }
}

// ============================================================================
// Countdown machine
// ============================================================================

/// Result of one countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownTick {
    /// Seconds still remaining.
    Counting(u32),
    /// Countdown reached zero; the action fires now and the timer is done.
    Fire,
}

/// One live countdown: `idle → countdown(remaining, target) →
/// {resolved-action | canceled}`. Exactly one may be active per trigger
/// family; the owning [`Escalation`] enforces that.
#[derive(Debug, Clone)]
pub struct CountdownAlert {
    session: AlertSession,
    fired: bool,
}

impl CountdownAlert {
    /// Start a countdown with the trigger's configured duration.
    pub fn start(trigger: AlertTrigger, target: AlertTarget) -> Self {
        Self::with_duration(trigger, target, countdown_secs(trigger))
    }

    /// Start a countdown with an explicit duration (tests, config overrides).
    pub fn with_duration(trigger: AlertTrigger, target: AlertTarget, secs: u32) -> Self {
        debug!(%trigger, secs, target = %target.description(), "Countdown started");
        Self {
            session: AlertSession {
                trigger,
                remaining: secs,
                target,
                started_at: chrono::Utc::now(),
            },
            fired: false,
        }
    }

    pub fn session(&self) -> &AlertSession {
        &self.session
    }

    /// Decrement the countdown by one second. Reaching zero (or below)
    /// reports `Fire` exactly once; the driver must then clear its timer.
    pub fn tick(&mut self) -> CountdownTick {
        if self.fired {
            return CountdownTick::Fire;
        }
        self.session.remaining = self.session.remaining.saturating_sub(1);
        if self.session.remaining == 0 {
            self.fired = true;
            CountdownTick::Fire
        } else {
            CountdownTick::Counting(self.session.remaining)
        }
    }
}

/// Owner of at most one active countdown per trigger family.
#[derive(Debug, Default)]
pub struct Escalation {
    active: Option<CountdownAlert>,
}

impl Escalation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a countdown. An already-active session is replaced; the
    /// caller cancels its previous timer first.
    pub fn begin(&mut self, trigger: AlertTrigger, target: AlertTarget) -> &AlertSession {
        self.active = Some(CountdownAlert::start(trigger, target));
        // Just inserted above.
        #[allow(clippy::unwrap_used)]
        self.active.as_ref().map(CountdownAlert::session).unwrap()
    }

    /// Begin with an explicit duration.
    pub fn begin_with_duration(
        &mut self,
        trigger: AlertTrigger,
        target: AlertTarget,
        secs: u32,
    ) {
        self.active = Some(CountdownAlert::with_duration(trigger, target, secs));
    }

    pub fn active_session(&self) -> Option<&AlertSession> {
        self.active.as_ref().map(CountdownAlert::session)
    }

    /// Tick the active countdown. On `Fire` the session is consumed and
    /// its target returned for action resolution.
    pub fn tick(&mut self) -> Option<(CountdownTick, Option<AlertTarget>)> {
        let alert = self.active.as_mut()?;
        match alert.tick() {
            CountdownTick::Fire => {
                let target = self.active.take().map(|a| a.session.target);
                Some((CountdownTick::Fire, target))
            }
            counting => Some((counting, None)),
        }
    }

    /// Cancel the active countdown without side effects. Idempotent: a
    /// second cancel is a no-op.
    pub fn cancel(&mut self) {
        if self.active.take().is_some() {
            debug!("Countdown canceled");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }
}

// ============================================================================
// AI-risk review precursor
// ============================================================================

/// Result of one review-window tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewTick {
    Counting(u32),
    /// Window elapsed; escalate into the SOS countdown.
    Escalate,
}

/// Precursor machine for the AI-risk path:
/// `risk-detected → (review window) → {dismiss | timeout/confirm → SOS}`.
///
/// Dismissal is handled by the owner, which must also resume the audio
/// pipeline's auto-monitoring.
#[derive(Debug, Clone)]
pub struct RiskReview {
    pub reason: String,
    remaining: u32,
    elapsed: bool,
}

impl RiskReview {
    pub fn start(reason: impl Into<String>) -> Self {
        Self::with_duration(reason, config::get().timers.risk_review_secs)
    }

    pub fn with_duration(reason: impl Into<String>, secs: u32) -> Self {
        Self {
            reason: reason.into(),
            remaining: secs,
            elapsed: false,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn tick(&mut self) -> ReviewTick {
        if self.elapsed {
            return ReviewTick::Escalate;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.elapsed = true;
            ReviewTick::Escalate
        } else {
            ReviewTick::Counting(self.remaining)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{RecordingDispatcher, SentAlert};

    fn contact(id: u64, name: &str) -> Contact {
        Contact {
            id,
            name: name.to_string(),
            phone: "555".to_string(),
        }
    }

    #[test]
    fn test_countdown_runs_to_fire() {
        let mut esc = Escalation::new();
        esc.begin_with_duration(AlertTrigger::Sos, AlertTarget::EmergencyServices, 3);

        assert_eq!(esc.tick(), Some((CountdownTick::Counting(2), None)));
        assert_eq!(esc.tick(), Some((CountdownTick::Counting(1), None)));
        let (tick, target) = esc.tick().unwrap();
        assert_eq!(tick, CountdownTick::Fire);
        assert_eq!(target, Some(AlertTarget::EmergencyServices));
        // Session destroyed on completion.
        assert!(!esc.is_active());
        assert!(esc.tick().is_none());
    }

    #[test]
    fn test_cancel_prevents_fire_and_is_idempotent() {
        let mut esc = Escalation::new();
        esc.begin_with_duration(AlertTrigger::Panic, AlertTarget::EmergencyServices, 5);

        esc.tick();
        esc.tick(); // remaining = 3
        esc.cancel();
        assert!(!esc.is_active());
        // The action can never fire after a cancel.
        assert!(esc.tick().is_none());
        // Second cancel is a no-op.
        esc.cancel();
        assert!(!esc.is_active());
    }

    #[test]
    fn test_target_resolution_branches() {
        assert_eq!(resolve_target(&[]), AlertTarget::EmergencyServices);
        let t = resolve_target(&[contact(1, "A")]);
        assert!(matches!(t, AlertTarget::Contacts(ref c) if c.len() == 1));
    }

    #[test]
    fn test_resolved_action_is_mutually_exclusive() {
        let dispatcher = RecordingDispatcher::new();

        // No recipients: emergency call, no message.
        let action = resolve_action(&AlertTarget::EmergencyServices, None, false);
        execute(&action, &dispatcher);

        // Recipients: message, no emergency call.
        let target = AlertTarget::Contacts(vec![contact(1, "A")]);
        let action = resolve_action(&target, Some(Coordinate::new(1.0, 2.0)), true);
        execute(&action, &dispatcher);

        let sent = dispatcher.sent();
        assert_eq!(sent.len(), 2);
        assert!(matches!(sent[0], SentAlert::EmergencyCall { .. }));
        match &sent[1] {
            SentAlert::Message { subject, body, .. } => {
                assert_eq!(subject, "SOS ALERT - I NEED HELP");
                assert!(body.contains("maps?q=1,2"));
                assert!(body.contains("audio clip"));
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn test_review_window_escalates_on_timeout() {
        let mut review = RiskReview::with_duration("shouting detected", 2);
        assert_eq!(review.tick(), ReviewTick::Counting(1));
        assert_eq!(review.tick(), ReviewTick::Escalate);
    }

    #[test]
    fn test_new_session_replaces_previous() {
        let mut esc = Escalation::new();
        esc.begin_with_duration(AlertTrigger::Sos, AlertTarget::EmergencyServices, 5);
        esc.begin_with_duration(AlertTrigger::Panic, AlertTarget::EmergencyServices, 3);
        assert_eq!(
            esc.active_session().map(|s| s.trigger),
            Some(AlertTrigger::Panic)
        );
        assert_eq!(esc.active_session().map(|s| s.remaining), Some(3));
    }
}
