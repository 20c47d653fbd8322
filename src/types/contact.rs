//! Contacts, groups, and safety tips.

use serde::{Deserialize, Serialize};

pub type ContactId = u64;
pub type GroupId = u64;

/// An emergency contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub name: String,
    pub phone: String,
}

/// A named set of contacts, referenced by id.
///
/// Groups hold weak references: deleting a contact prunes it from every
/// group's member list as part of the same logical operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    /// Ordered member list.
    pub contact_ids: Vec<ContactId>,
}

/// A safety tip served to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyTip {
    pub title: String,
    pub tip: String,
    /// Icon class name for rendering (e.g. "fa-key").
    pub icon: String,
}
