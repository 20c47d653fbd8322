//! Core data model shared across subsystems.

mod alert;
mod contact;
mod risk;
mod zone;

pub use alert::{AlertSession, AlertTarget, AlertTrigger, ResolvedAction};
pub use contact::{Contact, ContactId, Group, GroupId, SafetyTip};
pub use risk::{RiskAssessment, RiskLevel, Sensitivity};
pub use zone::{Coordinate, SafetyZone, ZoneEvent, ZoneId, ZoneTransition};
