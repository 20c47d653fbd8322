//! Top-level safety pipeline.
//!
//! Wires the subsystems together: the coordinate source feeds the geofence
//! monitor, the audio pipeline feeds the risk-review precursor, and both
//! the review window and the manual triggers (SOS, panic) escalate through
//! the countdown machine to the outbound dispatcher.
//!
//! All timers live here, as cancellable driver tasks over the deterministic
//! tick cores. Every exit path (cancel, completion, teardown) stops its
//! timer; a leaked armed timer is a defect.

use std::sync::{Arc, Mutex as StdMutex, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audio::{AudioPipeline, CaptureDevice, RiskClassifier};
use crate::config;
use crate::directory::Directory;
use crate::escalation::{
    self, message, CountdownTick, Escalation, ReviewTick, RiskReview,
};
use crate::geofence::{GeofenceEngine, GeofenceMonitor};
use crate::location::{CoordinateSource, LocationTracker};
use crate::notify::AlertDispatcher;
use crate::settings::{AiSettings, FakeCallSettings, SharingSession};
use crate::signal::Signal;
use crate::storage::KeyValueStore;
use crate::types::{
    AlertSession, AlertTarget, AlertTrigger, Contact, ResolvedAction, RiskAssessment,
};

/// A pending AI-risk alert awaiting operator review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskAlert {
    pub reason: String,
    /// Seconds left in the review window before auto-escalation.
    pub remaining: u32,
}

struct TaskHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl TaskHandle {
    fn stop(self) {
        self.token.cancel();
        self.handle.abort();
    }
}

/// Every live driver task, one slot each. A slot is replaced by stopping
/// its predecessor first.
#[derive(Default)]
struct Tasks {
    location: Option<TaskHandle>,
    geofence_feed: Option<TaskHandle>,
    risk_listener: Option<TaskHandle>,
    review_timer: Option<TaskHandle>,
    countdown_timer: Option<TaskHandle>,
    manual_cap: Option<TaskHandle>,
}

/// The assembled safety runtime. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct SafetyPipeline {
    directory: Arc<RwLock<Directory>>,
    dispatcher: Arc<dyn AlertDispatcher>,
    audio: Arc<AudioPipeline>,
    tracker: Arc<LocationTracker>,
    geofence: Arc<Mutex<GeofenceMonitor>>,
    escalation: Arc<Mutex<Escalation>>,
    review: Arc<Mutex<Option<RiskReview>>>,
    ai_settings: Arc<AiSettings>,
    fake_call: Arc<FakeCallSettings>,
    sharing: Arc<SharingSession>,
    tasks: Arc<StdMutex<Tasks>>,

    /// Active countdown, for UI binding. `None` when idle.
    pub alert_session: Signal<Option<AlertSession>>,
    /// Pending AI-risk review, for UI binding.
    pub risk_alert: Signal<Option<RiskAlert>>,
    /// Last resolved action, the post-fire confirmation state.
    pub outcome: Signal<Option<ResolvedAction>>,
}

impl SafetyPipeline {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        dispatcher: Arc<dyn AlertDispatcher>,
        device: Arc<dyn CaptureDevice>,
        classifier: Arc<dyn RiskClassifier>,
    ) -> Self {
        info!(backend = store.backend_name(), "Assembling safety pipeline");
        let directory = Arc::new(RwLock::new(Directory::load(store.clone())));
        let engine = GeofenceEngine::load(store.clone());
        let geofence = Arc::new(Mutex::new(GeofenceMonitor::new(
            engine,
            directory.clone(),
            dispatcher.clone(),
        )));
        Self {
            directory,
            dispatcher,
            audio: Arc::new(AudioPipeline::new(device, classifier)),
            tracker: Arc::new(LocationTracker::new()),
            geofence,
            escalation: Arc::new(Mutex::new(Escalation::new())),
            review: Arc::new(Mutex::new(None)),
            ai_settings: Arc::new(AiSettings::load(store.clone())),
            fake_call: Arc::new(FakeCallSettings::load(store.clone())),
            sharing: Arc::new(SharingSession::load(store)),
            tasks: Arc::new(StdMutex::new(Tasks::default())),
            alert_session: Signal::new(None),
            risk_alert: Signal::new(None),
            outcome: Signal::new(None),
        }
    }

    // ------------------------------------------------------------------
    // Subsystem access
    // ------------------------------------------------------------------

    pub fn directory(&self) -> &Arc<RwLock<Directory>> {
        &self.directory
    }

    pub fn geofence(&self) -> &Arc<Mutex<GeofenceMonitor>> {
        &self.geofence
    }

    pub fn tracker(&self) -> &LocationTracker {
        &self.tracker
    }

    pub fn audio(&self) -> &AudioPipeline {
        &self.audio
    }

    pub fn ai_settings(&self) -> &AiSettings {
        &self.ai_settings
    }

    pub fn fake_call(&self) -> &FakeCallSettings {
        &self.fake_call
    }

    pub fn sharing(&self) -> &SharingSession {
        &self.sharing
    }

    // ------------------------------------------------------------------
    // Location watch → geofence feed
    // ------------------------------------------------------------------

    /// Start the location watch. Updates flow through a channel to a
    /// single consumer task, so the geofence engine sees coordinates in
    /// strict arrival order.
    pub fn start_location_watch<S: CoordinateSource>(&self, source: S) {
        let (coord_tx, mut coord_rx) = mpsc::unbounded_channel();

        let tracker = self.tracker.clone();
        let watch_token = CancellationToken::new();
        let watch_child = watch_token.clone();
        let watch = tokio::spawn(async move {
            tracker
                .run(source, watch_child, move |coords| {
                    let _ = coord_tx.send(coords);
                })
                .await;
        });

        let geofence = self.geofence.clone();
        let feed_token = CancellationToken::new();
        let feed_child = feed_token.clone();
        let feed = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = feed_child.cancelled() => break,
                    coords = coord_rx.recv() => {
                        let Some(coords) = coords else { break };
                        geofence.lock().await.on_coordinate(coords);
                    }
                }
            }
        });

        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(prev) = tasks.location.replace(TaskHandle {
                token: watch_token,
                handle: watch,
            }) {
                prev.stop();
            }
            if let Some(prev) = tasks.geofence_feed.replace(TaskHandle {
                token: feed_token,
                handle: feed,
            }) {
                prev.stop();
            }
        }
    }

    // ------------------------------------------------------------------
    // AI monitoring and risk review
    // ------------------------------------------------------------------

    /// Start audio auto-monitoring and listen for detections. Detections
    /// below the configured sensitivity threshold restart monitoring;
    /// accepted ones open the review window.
    pub async fn start_ai_monitoring(&self) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.audio.start_monitoring(tx).await;
        if !self.audio.is_monitoring().get() {
            return;
        }

        let this = self.clone();
        let token = CancellationToken::new();
        let child = token.clone();
        let handle = tokio::spawn(async move {
            loop {
                let assessment: Option<RiskAssessment> = tokio::select! {
                    _ = child.cancelled() => break,
                    a = rx.recv() => a,
                };
                let Some(assessment) = assessment else { break };

                if this.ai_settings.sensitivity().get().accepts(assessment.risk_level) {
                    this.begin_risk_review(assessment.reason).await;
                    // Monitoring is down until the operator resolves the
                    // alert; a new listener is wired up on resume.
                    break;
                }

                debug!(
                    level = %assessment.risk_level,
                    "Detection below sensitivity threshold — resuming monitoring"
                );
                let (tx, new_rx) = mpsc::unbounded_channel();
                this.audio.start_monitoring(tx).await;
                if !this.audio.is_monitoring().get() {
                    break;
                }
                rx = new_rx;
            }
        });

        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(prev) = tasks.risk_listener.replace(TaskHandle { token, handle }) {
                prev.stop();
            }
        }
    }

    /// Stop audio auto-monitoring and the detection listener.
    pub async fn stop_ai_monitoring(&self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(task) = tasks.risk_listener.take() {
                task.stop();
            }
        }
        self.audio.stop_monitoring().await;
    }

    /// Open the AI-risk review window. Times out into the SOS countdown
    /// unless dismissed or confirmed first.
    async fn begin_risk_review(&self, reason: String) {
        let review = RiskReview::start(reason.clone());
        warn!(%reason, "Risk detected — review window open");
        self.risk_alert.set(Some(RiskAlert {
            reason,
            remaining: review.remaining(),
        }));
        *self.review.lock().await = Some(review);

        let this = self.clone();
        let token = CancellationToken::new();
        let child = token.clone();
        let handle = tokio::spawn(async move {
            let period = Duration::from_secs(1);
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = interval.tick() => {
                        let escalate = {
                            let mut review = this.review.lock().await;
                            let Some(r) = review.as_mut() else { break };
                            match r.tick() {
                                ReviewTick::Counting(remaining) => {
                                    this.risk_alert.update(|alert| {
                                        if let Some(a) = alert.as_mut() {
                                            a.remaining = remaining;
                                        }
                                    });
                                    false
                                }
                                ReviewTick::Escalate => {
                                    *review = None;
                                    true
                                }
                            }
                        };
                        if escalate {
                            // Own slot; take without abort.
                            if let Ok(mut tasks) = this.tasks.lock() {
                                tasks.review_timer.take();
                            }
                            this.risk_alert.set(None);
                            this.begin_countdown(AlertTrigger::RiskConfirmed).await;
                            break;
                        }
                    }
                }
            }
        });

        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(prev) = tasks.review_timer.replace(TaskHandle { token, handle }) {
                prev.stop();
            }
        }
    }

    /// Dismiss the pending risk alert and resume auto-monitoring.
    pub async fn dismiss_risk_alert(&self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(task) = tasks.review_timer.take() {
                task.stop();
            }
        }
        *self.review.lock().await = None;
        self.risk_alert.set(None);
        info!("Risk alert dismissed — resuming monitoring");
        self.start_ai_monitoring().await;
    }

    /// Confirm the pending risk alert, entering the SOS countdown now.
    pub async fn confirm_risk_alert(&self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(task) = tasks.review_timer.take() {
                task.stop();
            }
        }
        if self.review.lock().await.take().is_none() {
            return;
        }
        self.risk_alert.set(None);
        self.begin_countdown(AlertTrigger::RiskConfirmed).await;
    }

    // ------------------------------------------------------------------
    // Escalation
    // ------------------------------------------------------------------

    pub async fn trigger_sos(&self) {
        self.begin_countdown(AlertTrigger::Sos).await;
    }

    pub async fn trigger_panic(&self) {
        self.begin_countdown(AlertTrigger::Panic).await;
    }

    async fn begin_countdown(&self, trigger: AlertTrigger) {
        // Replacing a session: its timer goes first.
        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(task) = tasks.countdown_timer.take() {
                task.stop();
            }
        }

        let target = {
            let contacts = match self.directory.read() {
                Ok(dir) => dir.contacts().to_vec(),
                Err(e) => {
                    warn!(error = %e, "Directory lock poisoned — using fallback target");
                    Vec::new()
                }
            };
            escalation::resolve_target(&contacts)
        };

        let session = self.escalation.lock().await.begin(trigger, target).clone();
        self.alert_session.set(Some(session));
        self.outcome.set(None);

        let this = self.clone();
        let token = CancellationToken::new();
        let child = token.clone();
        let handle = tokio::spawn(async move {
            let period = Duration::from_secs(1);
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = interval.tick() => {
                        let fired = {
                            let mut esc = this.escalation.lock().await;
                            match esc.tick() {
                                None => break,
                                Some((CountdownTick::Counting(remaining), _)) => {
                                    this.alert_session.update(|s| {
                                        if let Some(session) = s.as_mut() {
                                            session.remaining = remaining;
                                        }
                                    });
                                    None
                                }
                                Some((CountdownTick::Fire, target)) => target,
                            }
                        };
                        if let Some(target) = fired {
                            if let Ok(mut tasks) = this.tasks.lock() {
                                tasks.countdown_timer.take();
                            }
                            this.fire_alert(target).await;
                            break;
                        }
                    }
                }
            }
        });

        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(prev) = tasks.countdown_timer.replace(TaskHandle { token, handle }) {
                prev.stop();
            }
        }
    }

    async fn fire_alert(&self, target: AlertTarget) {
        let coords = self.tracker.coordinates.get();
        let has_clip = self.audio.manual_clip().get().is_some();
        let action = escalation::resolve_action(&target, coords, has_clip);
        escalation::execute(&action, self.dispatcher.as_ref());
        if has_clip {
            // The clip belongs to the alert it went out with.
            self.audio.clear_manual_clip();
        }
        self.alert_session.set(None);
        self.outcome.set(Some(action));
    }

    /// Cancel the active countdown without side effects. Idempotent.
    pub async fn cancel_alert(&self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(task) = tasks.countdown_timer.take() {
                task.stop();
            }
        }
        self.escalation.lock().await.cancel();
        self.alert_session.set(None);
    }

    // ------------------------------------------------------------------
    // Manual recording (hard duration ceiling lives here)
    // ------------------------------------------------------------------

    /// Start a manual recording with the auto-stop ceiling armed. Returns
    /// whether recording started.
    pub async fn start_manual_recording(&self) -> bool {
        if !self.audio.start_manual_recording().await {
            return false;
        }

        let this = self.clone();
        let token = CancellationToken::new();
        let child = token.clone();
        let cap = Duration::from_secs(config::get().timers.manual_recording_cap_secs);
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = child.cancelled() => {}
                _ = tokio::time::sleep(cap) => {
                    debug!("Manual recording hit the duration ceiling — auto-finalizing");
                    if let Ok(mut tasks) = this.tasks.lock() {
                        tasks.manual_cap.take();
                    }
                    this.audio.stop_manual_recording().await;
                }
            }
        });

        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(prev) = tasks.manual_cap.replace(TaskHandle { token, handle }) {
                prev.stop();
            }
        }
        true
    }

    /// Stop a manual recording before the ceiling.
    pub async fn stop_manual_recording(&self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(task) = tasks.manual_cap.take() {
                task.stop();
            }
        }
        self.audio.stop_manual_recording().await;
    }

    // ------------------------------------------------------------------
    // Location sharing
    // ------------------------------------------------------------------

    /// Begin a sharing session and send the invitation to the recipients.
    /// Rejected when the recipient list is empty.
    pub fn start_sharing(&self, recipients: Vec<Contact>) -> bool {
        if recipients.is_empty() {
            return false;
        }
        if let Some(coords) = self.tracker.coordinates.get() {
            self.dispatcher.send(
                &recipients,
                &message::sharing_subject(),
                &message::sharing_body(coords),
            );
        }
        self.sharing.start(recipients);
        true
    }

    pub fn stop_sharing(&self) {
        self.sharing.stop();
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Tear everything down: cancel every live timer and task, release the
    /// capture device, and clear transient observables.
    pub async fn shutdown(&self) {
        info!("Safety pipeline shutting down");
        if let Ok(mut tasks) = self.tasks.lock() {
            for task in [
                tasks.location.take(),
                tasks.geofence_feed.take(),
                tasks.risk_listener.take(),
                tasks.review_timer.take(),
                tasks.countdown_timer.take(),
                tasks.manual_cap.take(),
            ]
            .into_iter()
            .flatten()
            {
                task.stop();
            }
        }
        self.escalation.lock().await.cancel();
        *self.review.lock().await = None;
        self.audio.stop_monitoring().await;
        self.geofence.lock().await.shutdown();
        self.alert_session.set(None);
        self.risk_alert.set(None);
        self.outcome.set(None);
    }
}
