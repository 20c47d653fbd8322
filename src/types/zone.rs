//! Coordinates, safety zones, and zone transition events.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{ContactId, GroupId};

/// Zone identifier, assigned at creation and stable for the zone's lifetime.
pub type ZoneId = u64;

/// Immutable position snapshot. Superseded on each location update;
/// no history is retained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Google Maps link for alert messages.
    pub fn maps_link(&self) -> String {
        format!(
            "https://www.google.com/maps?q={},{}",
            self.latitude, self.longitude
        )
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// A named circular region whose boundary crossings are monitored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyZone {
    pub id: ZoneId,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Radius in meters.
    pub radius: f64,
    pub notify_on_enter: bool,
    pub notify_on_leave: bool,
    /// Explicit recipient contacts for this zone's notifications.
    #[serde(default)]
    pub notification_contact_ids: BTreeSet<ContactId>,
    /// Recipient groups, expanded to contacts at notification time.
    #[serde(default)]
    pub notification_group_ids: BTreeSet<GroupId>,
}

impl SafetyZone {
    /// Zone center as a coordinate.
    pub const fn center(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Direction of a zone boundary crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneTransition {
    Enter,
    Leave,
}

impl ZoneTransition {
    /// Past-tense verb for alert message bodies.
    pub const fn verb(&self) -> &'static str {
        match self {
            ZoneTransition::Enter => "entered",
            ZoneTransition::Leave => "left",
        }
    }
}

impl std::fmt::Display for ZoneTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ZoneTransition::Enter => write!(f, "enter"),
            ZoneTransition::Leave => write!(f, "leave"),
        }
    }
}

/// A fired boundary-crossing event, exposed as a short-lived observable
/// for UI acknowledgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneEvent {
    pub zone: SafetyZone,
    pub transition: ZoneTransition,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}
