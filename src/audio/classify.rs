//! Risk-classification collaborator.
//!
//! Maps an encoded audio sample to a risk level plus reason. The contract
//! requires a safe `none` default on any internal failure, so the trait is
//! infallible: implementations swallow their own errors and report
//! `RiskLevel::None` rather than escalate on infrastructure faults.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::types::RiskAssessment;

/// Classifies audio samples for signs of distress, danger, or aggression.
#[async_trait]
pub trait RiskClassifier: Send + Sync {
    /// Classify one audio sample. Must not fail; any internal error maps
    /// to a `RiskLevel::None` assessment.
    async fn classify(&self, audio: &[u8]) -> RiskAssessment;
}

/// Classifier that never reports risk. Default for deployments without a
/// configured oracle.
#[derive(Debug, Default)]
pub struct PassiveClassifier;

#[async_trait]
impl RiskClassifier for PassiveClassifier {
    async fn classify(&self, _audio: &[u8]) -> RiskAssessment {
        RiskAssessment::none("no classifier configured")
    }
}

/// Test double that replays a scripted sequence of assessments, then
/// reports `none` once exhausted.
#[derive(Debug, Default)]
pub struct ScriptedClassifier {
    results: Mutex<VecDeque<RiskAssessment>>,
}

impl ScriptedClassifier {
    pub fn new(results: Vec<RiskAssessment>) -> Self {
        Self {
            results: Mutex::new(results.into()),
        }
    }
}

#[async_trait]
impl RiskClassifier for ScriptedClassifier {
    async fn classify(&self, _audio: &[u8]) -> RiskAssessment {
        self.results
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| RiskAssessment::none("script exhausted"))
    }
}
