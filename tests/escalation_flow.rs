//! End-to-end escalation flows through the assembled pipeline.
//!
//! Time is paused and auto-advanced by the runtime, so the countdown and
//! review timers run to completion without wall-clock waits.

use std::sync::Arc;
use std::time::Duration;

use aura_sentinel::audio::{PassiveClassifier, RiskClassifier, ScriptedClassifier, SimulatedDevice};
use aura_sentinel::notify::{RecordingDispatcher, SentAlert};
use aura_sentinel::storage::MemoryStore;
use aura_sentinel::types::{RiskAssessment, RiskLevel};
use aura_sentinel::SafetyPipeline;

fn assemble(
    dispatcher: Arc<RecordingDispatcher>,
    chunks: Vec<Vec<u8>>,
    classifier: Arc<dyn RiskClassifier>,
) -> SafetyPipeline {
    SafetyPipeline::new(
        Arc::new(MemoryStore::new()),
        dispatcher,
        Arc::new(SimulatedDevice::with_chunks(chunks)),
        classifier,
    )
}

async fn wait_for_outcome(pipeline: &SafetyPipeline) {
    let mut outcome = pipeline.outcome.subscribe();
    while outcome.borrow_and_update().is_none() {
        outcome
            .changed()
            .await
            .expect("outcome signal closed before the alert fired");
    }
}

#[tokio::test(start_paused = true)]
async fn sos_with_contacts_composes_alert_message() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let pipeline = assemble(dispatcher.clone(), Vec::new(), Arc::new(PassiveClassifier));

    {
        let mut dir = pipeline.directory().write().unwrap();
        dir.add_contact("Alice", "(555) 111-2222").unwrap();
        dir.add_contact("Bob", "(555) 333-4444").unwrap();
    }

    pipeline.trigger_sos().await;
    wait_for_outcome(&pipeline).await;

    let sent = dispatcher.sent();
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        SentAlert::Message {
            recipients,
            subject,
            body,
        } => {
            assert_eq!(recipients.len(), 2);
            assert_eq!(subject, "SOS ALERT - I NEED HELP");
            // No location watch running: the body says so.
            assert!(body.contains("My current location is not available."));
        }
        other => panic!("expected an alert message, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn sos_without_contacts_dials_emergency_services() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let pipeline = assemble(dispatcher.clone(), Vec::new(), Arc::new(PassiveClassifier));

    pipeline.trigger_sos().await;
    wait_for_outcome(&pipeline).await;

    // Mutually exclusive branches: the call, never the message path.
    let sent = dispatcher.sent();
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        SentAlert::EmergencyCall { number } => assert_eq!(number, "911"),
        other => panic!("expected an emergency call, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn detection_escalates_through_review_to_dispatch() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let classifier = Arc::new(ScriptedClassifier::new(vec![RiskAssessment {
        risk_level: RiskLevel::High,
        reason: "screaming detected".to_string(),
    }]));
    let pipeline = assemble(dispatcher.clone(), vec![vec![1; 16]], classifier);

    pipeline.start_ai_monitoring().await;

    // The duty cycle picks up the sample and opens the review window.
    let mut risk = pipeline.risk_alert.subscribe();
    while risk.borrow_and_update().is_none() {
        risk.changed().await.unwrap();
    }
    assert_eq!(
        pipeline.risk_alert.get().map(|a| a.reason),
        Some("screaming detected".to_string())
    );
    // Monitoring goes idle after a positive detection.
    assert!(!pipeline.audio().is_monitoring().get());

    // Untouched, the review window times out into the SOS countdown,
    // which fires the fallback (no contacts configured).
    wait_for_outcome(&pipeline).await;
    assert!(pipeline.risk_alert.get().is_none());
    assert!(matches!(
        dispatcher.sent().as_slice(),
        [SentAlert::EmergencyCall { .. }]
    ));
}

#[tokio::test(start_paused = true)]
async fn dismissing_risk_alert_resumes_monitoring() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let classifier = Arc::new(ScriptedClassifier::new(vec![RiskAssessment {
        risk_level: RiskLevel::Medium,
        reason: "raised voices".to_string(),
    }]));
    let pipeline = assemble(dispatcher.clone(), vec![vec![1; 16], vec![2; 16]], classifier);

    pipeline.start_ai_monitoring().await;
    let mut risk = pipeline.risk_alert.subscribe();
    while risk.borrow_and_update().is_none() {
        risk.changed().await.unwrap();
    }

    pipeline.dismiss_risk_alert().await;
    assert!(pipeline.risk_alert.get().is_none());
    assert!(pipeline.audio().is_monitoring().get());

    // Script exhausted: further cycles classify as none. Nothing may fire.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(dispatcher.sent().is_empty());
    assert!(pipeline.outcome.get().is_none());

    pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn alert_consumes_the_manual_clip() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let pipeline = assemble(
        dispatcher.clone(),
        vec![vec![1; 16], vec![2; 16]],
        Arc::new(PassiveClassifier),
    );
    {
        let mut dir = pipeline.directory().write().unwrap();
        dir.add_contact("Alice", "(555) 111-2222").unwrap();
    }

    pipeline.start_ai_monitoring().await;
    assert!(pipeline.start_manual_recording().await);
    pipeline.stop_manual_recording().await;
    assert!(pipeline.audio().manual_clip().get().is_some());

    pipeline.trigger_sos().await;
    wait_for_outcome(&pipeline).await;

    // The clip rides out with the alert it was recorded for; afterwards
    // it is gone, and the next alert makes no claim about it.
    assert!(pipeline.audio().manual_clip().get().is_none());

    pipeline.trigger_sos().await;
    for _ in 0..200 {
        if dispatcher.sent().len() >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let sent = dispatcher.sent();
    assert_eq!(sent.len(), 2);
    match (&sent[0], &sent[1]) {
        (SentAlert::Message { body: first, .. }, SentAlert::Message { body: second, .. }) => {
            assert!(first.contains("An audio clip was recorded with this alert."));
            assert!(!second.contains("audio clip"));
        }
        other => panic!("expected two alert messages, got {other:?}"),
    }

    pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn cancel_during_countdown_never_dispatches() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let pipeline = assemble(dispatcher.clone(), Vec::new(), Arc::new(PassiveClassifier));

    pipeline.trigger_panic().await;
    assert!(pipeline.alert_session.get().is_some());
    pipeline.cancel_alert().await;

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(dispatcher.sent().is_empty());
    assert!(pipeline.alert_session.get().is_none());
}
