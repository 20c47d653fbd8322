//! Safety-tip content.
//!
//! Tip content is fetched from an external provider when one is wired in;
//! any failure or empty result substitutes the fixed built-in list so the
//! surface never renders blank.

use async_trait::async_trait;
use tracing::warn;

use crate::types::SafetyTip;

/// Produces the ordered safety-tip list.
#[async_trait]
pub trait TipProvider: Send + Sync {
    async fn fetch_tips(&self) -> anyhow::Result<Vec<SafetyTip>>;
}

/// Provider that always yields a fixed list. Doubles as the no-backend
/// default when constructed over [`default_tips`].
pub struct StaticTipProvider {
    tips: Vec<SafetyTip>,
}

impl StaticTipProvider {
    pub fn new(tips: Vec<SafetyTip>) -> Self {
        Self { tips }
    }
}

impl Default for StaticTipProvider {
    fn default() -> Self {
        Self::new(default_tips())
    }
}

#[async_trait]
impl TipProvider for StaticTipProvider {
    async fn fetch_tips(&self) -> anyhow::Result<Vec<SafetyTip>> {
        Ok(self.tips.clone())
    }
}

/// Test double that always fails.
pub struct FailingTipProvider;

#[async_trait]
impl TipProvider for FailingTipProvider {
    async fn fetch_tips(&self) -> anyhow::Result<Vec<SafetyTip>> {
        anyhow::bail!("tip provider unavailable")
    }
}

/// Fetch tips through the provider, falling back to the built-in list on
/// error or an empty result.
pub async fn load_tips(provider: &dyn TipProvider) -> Vec<SafetyTip> {
    match provider.fetch_tips().await {
        Ok(tips) if !tips.is_empty() => tips,
        Ok(_) => {
            warn!("Tip provider returned no tips, using built-in list");
            default_tips()
        }
        Err(e) => {
            warn!(error = %e, "Tip provider failed, using built-in list");
            default_tips()
        }
    }
}

fn tip(title: &str, tip: &str, icon: &str) -> SafetyTip {
    SafetyTip {
        title: title.to_string(),
        tip: tip.to_string(),
        icon: icon.to_string(),
    }
}

/// The built-in tip list, in display order.
pub fn default_tips() -> Vec<SafetyTip> {
    vec![
        tip(
            "Be Aware of Surroundings",
            "Pay attention to who and what is around you. Avoid distractions like your phone when walking alone.",
            "fa-eye",
        ),
        tip(
            "Trust Your Instincts",
            "If a situation or person feels unsafe, it probably is. Remove yourself from the situation immediately.",
            "fa-brain",
        ),
        tip(
            "Share Your Plans",
            "Let a trusted friend or family member know your plans, where you're going, and when you expect to be back.",
            "fa-share-nodes",
        ),
        tip(
            "Walk Confidently",
            "Walk with purpose and maintain good posture. Projecting confidence can make you appear as a less likely target.",
            "fa-person-walking",
        ),
        tip(
            "Secure Your Home",
            "Always lock doors and windows, even when you're home. Use peepholes to see who is at the door.",
            "fa-key",
        ),
        tip(
            "Parking Lot Safety",
            "Have your keys ready as you approach your car. Check the back seat before getting in. Park in well-lit areas.",
            "fa-car",
        ),
        tip(
            "Public Transport Smarts",
            "Try to sit near the driver or in a well-populated car. Be aware of your stops and stay awake and alert.",
            "fa-bus-simple",
        ),
        tip(
            "Online Safety",
            "Be cautious about sharing personal information online. Be wary of meeting someone in person you only know online.",
            "fa-globe",
        ),
    ]
}
