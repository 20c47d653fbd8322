//! Risk levels, classification results, and detection sensitivity.

use serde::{Deserialize, Serialize};

/// Risk level assigned by the classification oracle to an audio sample.
///
/// Variant order matters: derived `Ord` gives `None < Low < Medium < High`,
/// which the sensitivity threshold comparison relies on.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::None => write!(f, "none"),
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}

/// Result of one classification cycle. Ephemeral: produced per analysis
/// cycle and consumed immediately by the escalation trigger logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_level: RiskLevel,
    pub reason: String,
}

impl RiskAssessment {
    /// Safe default used whenever the classifier fails internally.
    /// Biases away from false alarms: infrastructure faults never escalate.
    pub fn none(reason: impl Into<String>) -> Self {
        Self {
            risk_level: RiskLevel::None,
            reason: reason.into(),
        }
    }
}

/// Detection sensitivity chosen by the user.
///
/// High sensitivity reacts to *lower* detected risk: high accepts
/// `Low` and above, medium accepts `Medium` and above, low accepts
/// only `High`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    Low,
    #[default]
    Medium,
    High,
}

impl Sensitivity {
    /// Minimum risk level that triggers an escalation at this sensitivity.
    pub const fn threshold(&self) -> RiskLevel {
        match self {
            Sensitivity::High => RiskLevel::Low,
            Sensitivity::Medium => RiskLevel::Medium,
            Sensitivity::Low => RiskLevel::High,
        }
    }

    /// Whether a detected level clears this sensitivity's threshold.
    /// `RiskLevel::None` never triggers, regardless of sensitivity.
    pub fn accepts(&self, level: RiskLevel) -> bool {
        level >= self.threshold()
    }
}

impl std::fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sensitivity::Low => write!(f, "low"),
            Sensitivity::Medium => write!(f, "medium"),
            Sensitivity::High => write!(f, "high"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::None < RiskLevel::Low);
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
    }

    #[test]
    fn test_high_sensitivity_accepts_low_risk() {
        assert!(Sensitivity::High.accepts(RiskLevel::Low));
        assert!(Sensitivity::High.accepts(RiskLevel::High));
    }

    #[test]
    fn test_low_sensitivity_requires_high_risk() {
        assert!(!Sensitivity::Low.accepts(RiskLevel::Low));
        assert!(!Sensitivity::Low.accepts(RiskLevel::Medium));
        assert!(Sensitivity::Low.accepts(RiskLevel::High));
    }

    #[test]
    fn test_none_never_triggers() {
        for s in [Sensitivity::Low, Sensitivity::Medium, Sensitivity::High] {
            assert!(!s.accepts(RiskLevel::None));
        }
    }
}
