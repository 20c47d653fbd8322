//! Audio risk-monitoring pipeline.
//!
//! Two mutually exclusive operating modes on top of one underlying capture
//! handle: duty-cycled auto-monitoring and manual clip capture. The duty
//! cycle rotates the capture segment every few seconds (stop, immediately
//! restart) and submits each closed segment to the risk classifier; a
//! positive detection is delivered exactly once and the pipeline goes idle
//! until the caller restarts it.
//!
//! Mode transitions are atomic with respect to the duty-cycle timer: the
//! pending timer is cancelled before device/segment state is mutated, and
//! rearmed only after the new state is consistent. At most one capture
//! segment is open at any time.

pub mod capture;
pub mod classify;

pub use capture::{CaptureDevice, CaptureError, CaptureSession, SimulatedDevice};
pub use classify::{PassiveClassifier, RiskClassifier, ScriptedClassifier};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config;
use crate::signal::Signal;
use crate::types::{RiskAssessment, RiskLevel};

/// Microphone permission state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionState {
    #[default]
    Prompt,
    Granted,
    Denied,
}

/// Outcome of one duty-cycle tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DutyOutcome {
    /// Keep the duty cycle running.
    Continue,
    /// Pipeline went idle (detection or degradation); timer is done.
    Halt,
}

struct Core {
    session: Option<Box<dyn CaptureSession>>,
    monitoring: bool,
    manual: bool,
    risk_tx: Option<mpsc::UnboundedSender<RiskAssessment>>,
}

struct DutyTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

struct Inner {
    device: Arc<dyn CaptureDevice>,
    classifier: Arc<dyn RiskClassifier>,
    core: Mutex<Core>,
    duty: std::sync::Mutex<Option<DutyTask>>,
    is_monitoring: Signal<bool>,
    permission: Signal<PermissionState>,
    is_manually_recording: Signal<bool>,
    manual_clip: Signal<Option<Vec<u8>>>,
}

/// The audio risk pipeline. Owns the capture handle exclusively; all
/// interaction with recording hardware goes through its mode-transition
/// operations.
pub struct AudioPipeline {
    inner: Arc<Inner>,
}

impl AudioPipeline {
    pub fn new(device: Arc<dyn CaptureDevice>, classifier: Arc<dyn RiskClassifier>) -> Self {
        Self {
            inner: Arc::new(Inner {
                device,
                classifier,
                core: Mutex::new(Core {
                    session: None,
                    monitoring: false,
                    manual: false,
                    risk_tx: None,
                }),
                duty: std::sync::Mutex::new(None),
                is_monitoring: Signal::new(false),
                permission: Signal::new(PermissionState::Prompt),
                is_manually_recording: Signal::new(false),
                manual_clip: Signal::new(None),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Observable state
    // ------------------------------------------------------------------

    pub fn is_monitoring(&self) -> &Signal<bool> {
        &self.inner.is_monitoring
    }

    pub fn permission(&self) -> &Signal<PermissionState> {
        &self.inner.permission
    }

    pub fn is_manually_recording(&self) -> &Signal<bool> {
        &self.inner.is_manually_recording
    }

    pub fn manual_clip(&self) -> &Signal<Option<Vec<u8>>> {
        &self.inner.manual_clip
    }

    pub fn clear_manual_clip(&self) {
        self.inner.manual_clip.set(None);
    }

    // ------------------------------------------------------------------
    // Auto-monitoring
    // ------------------------------------------------------------------

    /// Begin duty-cycled monitoring. Idempotent if already monitoring.
    ///
    /// Acquires the capture device once; on permission denial the pipeline
    /// records the denied state and stays idle, without retry. Risk
    /// detections are delivered on `risk_tx` — exactly one per monitoring
    /// run, after which the pipeline stops itself and the caller decides
    /// whether to restart.
    pub async fn start_monitoring(&self, risk_tx: mpsc::UnboundedSender<RiskAssessment>) {
        let mut core = self.inner.core.lock().await;
        if core.monitoring {
            return;
        }
        core.risk_tx = Some(risk_tx);

        if core.session.is_none() {
            match self.inner.device.acquire().await {
                Ok(session) => {
                    core.session = Some(session);
                    self.inner.permission.set(PermissionState::Granted);
                }
                Err(e) => {
                    warn!(error = %e, "Capture device unavailable — monitoring not started");
                    core.risk_tx = None;
                    self.inner.permission.set(PermissionState::Denied);
                    self.inner.is_monitoring.set(false);
                    return;
                }
            }
        }

        if let Some(session) = core.session.as_mut() {
            if let Err(e) = session.start_segment().await {
                Inner::degrade(&self.inner, &mut core, &e).await;
                return;
            }
        }

        core.monitoring = true;
        self.inner.is_monitoring.set(true);
        drop(core);

        info!("Audio monitoring started");
        self.arm_duty();
    }

    /// Halt monitoring: stop the duty-cycle timer, release the capture
    /// device, discard buffered audio, clear any manual clip. Idempotent.
    pub async fn stop_monitoring(&self) {
        // Cancel the pending timer before mutating device/segment state.
        self.disarm_duty();
        let mut core = self.inner.core.lock().await;
        if !core.monitoring && core.session.is_none() {
            return;
        }
        Inner::go_idle(&self.inner, &mut core).await;
        info!("Audio monitoring stopped");
    }

    // ------------------------------------------------------------------
    // Manual capture
    // ------------------------------------------------------------------

    /// Begin a manual recording. Valid only while monitoring is active and
    /// no manual recording is in progress; returns whether it started.
    ///
    /// Suspends the duty cycle and forces a clean segment boundary so the
    /// clip is not contaminated by stale buffered audio. The hard duration
    /// ceiling is enforced by the caller.
    pub async fn start_manual_recording(&self) -> bool {
        let mut core = self.inner.core.lock().await;
        if !core.monitoring || core.manual {
            return false;
        }

        // Suspend the duty cycle before touching segment state.
        self.disarm_duty();
        self.inner.manual_clip.set(None);

        let Some(session) = core.session.as_mut() else {
            return false;
        };
        // Discard whatever the auto cycle had buffered, then open the
        // clean segment for the clip.
        if let Err(e) = session.stop_segment().await {
            Inner::degrade(&self.inner, &mut core, &e).await;
            return false;
        }
        if let Err(e) = session.start_segment().await {
            Inner::degrade(&self.inner, &mut core, &e).await;
            return false;
        }

        core.manual = true;
        self.inner.is_manually_recording.set(true);
        debug!("Manual recording started");
        true
    }

    /// Finish a manual recording: encode the segment into a retrievable
    /// clip and, if auto-monitoring was active before, resume the duty
    /// cycle from a fresh segment. No-op when not manually recording.
    pub async fn stop_manual_recording(&self) {
        let mut core = self.inner.core.lock().await;
        if !core.manual {
            return;
        }
        core.manual = false;
        self.inner.is_manually_recording.set(false);

        let was_monitoring = core.monitoring;
        let Some(session) = core.session.as_mut() else {
            return;
        };
        match session.stop_segment().await {
            Ok(bytes) => {
                if !bytes.is_empty() {
                    debug!(bytes = bytes.len(), "Manual clip captured");
                    self.inner.manual_clip.set(Some(bytes));
                }
            }
            Err(e) => {
                Inner::degrade(&self.inner, &mut core, &e).await;
                return;
            }
        }

        if was_monitoring {
            if let Err(e) = session.start_segment().await {
                Inner::degrade(&self.inner, &mut core, &e).await;
                return;
            }
            drop(core);
            // Rearm only after the new state is consistent.
            self.arm_duty();
        }
    }

    // ------------------------------------------------------------------
    // Duty-cycle timer
    // ------------------------------------------------------------------

    fn arm_duty(&self) {
        let token = CancellationToken::new();
        let child = token.clone();
        let inner = Arc::clone(&self.inner);
        let period = Duration::from_secs(config::get().timers.duty_cycle_secs);

        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = interval.tick() => {
                        if Inner::duty_tick(&inner).await == DutyOutcome::Halt {
                            break;
                        }
                    }
                }
            }
        });

        if let Ok(mut slot) = self.inner.duty.lock() {
            if let Some(prev) = slot.replace(DutyTask { token, handle }) {
                prev.token.cancel();
                prev.handle.abort();
            }
        }
    }

    fn disarm_duty(&self) {
        if let Ok(mut slot) = self.inner.duty.lock() {
            if let Some(task) = slot.take() {
                task.token.cancel();
                task.handle.abort();
            }
        }
    }
}

impl Drop for AudioPipeline {
    fn drop(&mut self) {
        self.disarm_duty();
    }
}

impl Inner {
    /// One duty-cycle tick: rotate the capture segment and submit the
    /// closed segment for classification when it has data.
    async fn duty_tick(inner: &Arc<Inner>) -> DutyOutcome {
        let bytes = {
            let mut core = inner.core.lock().await;
            // A manual recording or a stop that raced this tick wins.
            if !core.monitoring || core.manual {
                return DutyOutcome::Continue;
            }
            let Some(session) = core.session.as_mut() else {
                return DutyOutcome::Continue;
            };
            let bytes = match session.stop_segment().await {
                Ok(b) => b,
                Err(e) => {
                    Inner::degrade(inner, &mut core, &e).await;
                    return DutyOutcome::Halt;
                }
            };
            if let Err(e) = session.start_segment().await {
                Inner::degrade(inner, &mut core, &e).await;
                return DutyOutcome::Halt;
            }
            bytes
        };

        if bytes.is_empty() {
            return DutyOutcome::Continue;
        }

        let assessment = inner.classifier.classify(&bytes).await;
        debug!(level = %assessment.risk_level, reason = %assessment.reason, "Audio analysis");

        if assessment.risk_level == RiskLevel::None {
            return DutyOutcome::Continue;
        }

        // Positive detection: deliver exactly once, then go idle. The
        // caller restarts monitoring after the alert is dismissed.
        let mut core = inner.core.lock().await;
        if let Some(tx) = core.risk_tx.take() {
            let _ = tx.send(assessment);
        }
        Inner::go_idle(inner, &mut core).await;
        if let Ok(mut slot) = inner.duty.lock() {
            if let Some(task) = slot.take() {
                task.token.cancel();
            }
        }
        info!("Risk detected — monitoring stopped pending operator action");
        DutyOutcome::Halt
    }

    /// Release the device and reset all mode state.
    async fn go_idle(inner: &Arc<Inner>, core: &mut Core) {
        if let Some(mut session) = core.session.take() {
            session.release().await;
        }
        core.monitoring = false;
        core.manual = false;
        core.risk_tx = None;
        inner.is_monitoring.set(false);
        inner.is_manually_recording.set(false);
        inner.manual_clip.set(None);
    }

    /// Hardware failure policy: degrade to idle with a denied permission
    /// state. Fail safe toward *not* alerting.
    async fn degrade(inner: &Arc<Inner>, core: &mut Core, err: &CaptureError) {
        warn!(error = %err, "Capture error — degrading to idle");
        Inner::go_idle(inner, core).await;
        inner.permission.set(PermissionState::Denied);
    }
}
