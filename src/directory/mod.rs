//! Contact and group directory.
//!
//! Pure resolution service plus mutation operations that keep referential
//! integrity: groups reference contacts by id, and deleting a contact
//! prunes it from every group's member list as part of the same logical
//! operation. Stale ids left behind by races are tolerated and silently
//! dropped at resolution time.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

use crate::storage::{self, keys, KeyValueStore};
use crate::types::{Contact, ContactId, Group, GroupId};

/// Contact/group directory backed by the key-value store.
pub struct Directory {
    contacts: Vec<Contact>,
    groups: Vec<Group>,
    next_id: u64,
    store: Arc<dyn KeyValueStore>,
}

impl Directory {
    /// Load the directory from the store. Absent or malformed data starts
    /// the directory empty.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let contacts: Vec<Contact> = storage::load_json(store.as_ref(), keys::CONTACTS);
        let groups: Vec<Group> = storage::load_json(store.as_ref(), keys::GROUPS);
        let next_id = contacts
            .iter()
            .map(|c| c.id)
            .chain(groups.iter().map(|g| g.id))
            .max()
            .map_or(1, |id| id + 1);
        debug!(
            contacts = contacts.len(),
            groups = groups.len(),
            "Directory loaded"
        );
        Self {
            contacts,
            groups,
            next_id,
            store,
        }
    }

    fn save_contacts(&self) {
        storage::save_json(self.store.as_ref(), keys::CONTACTS, &self.contacts);
    }

    fn save_groups(&self) {
        storage::save_json(self.store.as_ref(), keys::GROUPS, &self.groups);
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // ------------------------------------------------------------------
    // Contacts
    // ------------------------------------------------------------------

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn has_contacts(&self) -> bool {
        !self.contacts.is_empty()
    }

    /// Add a contact. Empty name or phone is rejected as a no-op.
    pub fn add_contact(&mut self, name: &str, phone: &str) -> Option<ContactId> {
        if name.is_empty() || phone.is_empty() {
            return None;
        }
        let id = self.allocate_id();
        self.contacts.push(Contact {
            id,
            name: name.to_string(),
            phone: phone.to_string(),
        });
        self.save_contacts();
        Some(id)
    }

    /// Delete a contact and prune it from every group's member list.
    pub fn delete_contact(&mut self, id: ContactId) {
        self.contacts.retain(|c| c.id != id);
        for group in &mut self.groups {
            group.contact_ids.retain(|&cid| cid != id);
        }
        self.save_contacts();
        self.save_groups();
    }

    // ------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Add a group. An empty name is rejected as a no-op.
    pub fn add_group(&mut self, name: &str, contact_ids: Vec<ContactId>) -> Option<GroupId> {
        if name.is_empty() {
            return None;
        }
        let id = self.allocate_id();
        self.groups.push(Group {
            id,
            name: name.to_string(),
            contact_ids,
        });
        self.save_groups();
        Some(id)
    }

    /// Replace a group by id. Unknown ids are ignored.
    pub fn update_group(&mut self, updated: Group) {
        if let Some(group) = self.groups.iter_mut().find(|g| g.id == updated.id) {
            *group = updated;
            self.save_groups();
        }
    }

    pub fn delete_group(&mut self, id: GroupId) {
        self.groups.retain(|g| g.id != id);
        self.save_groups();
    }

    /// Members of a group, dropping references to missing contacts.
    pub fn contacts_for_group(&self, group: &Group) -> Vec<Contact> {
        let by_id: HashMap<ContactId, &Contact> =
            self.contacts.iter().map(|c| (c.id, c)).collect();
        group
            .contact_ids
            .iter()
            .filter_map(|id| by_id.get(id).map(|c| (*c).clone()))
            .collect()
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    /// Resolve abstract recipient sets into a concrete recipient list.
    ///
    /// Expands group membership by id lookup, preserves first-occurrence
    /// order, deduplicates, and silently drops references to missing
    /// contacts or groups (tolerant of stale ids from deletions).
    pub fn resolve_recipients(
        &self,
        contact_ids: &BTreeSet<ContactId>,
        group_ids: &BTreeSet<GroupId>,
    ) -> Vec<Contact> {
        let by_id: HashMap<ContactId, &Contact> =
            self.contacts.iter().map(|c| (c.id, c)).collect();
        let groups_by_id: HashMap<GroupId, &Group> =
            self.groups.iter().map(|g| (g.id, g)).collect();

        let mut seen: BTreeSet<ContactId> = BTreeSet::new();
        let mut recipients = Vec::new();

        let expanded = contact_ids.iter().copied().chain(
            group_ids
                .iter()
                .filter_map(|gid| groups_by_id.get(gid))
                .flat_map(|g| g.contact_ids.iter().copied()),
        );

        for id in expanded {
            if seen.insert(id) {
                if let Some(contact) = by_id.get(&id) {
                    recipients.push((*contact).clone());
                }
            }
        }

        recipients
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn directory() -> Directory {
        Directory::load(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_add_contact_rejects_empty() {
        let mut dir = directory();
        assert!(dir.add_contact("", "555").is_none());
        assert!(dir.add_contact("A", "").is_none());
        assert!(dir.contacts().is_empty());
    }

    #[test]
    fn test_delete_contact_prunes_groups() {
        let mut dir = directory();
        let a = dir.add_contact("A", "111").unwrap();
        let b = dir.add_contact("B", "222").unwrap();
        let g = dir.add_group("Family", vec![a, b]).unwrap();

        dir.delete_contact(a);

        let group = dir.groups().iter().find(|gr| gr.id == g).unwrap().clone();
        assert_eq!(group.contact_ids, vec![b]);

        let resolved =
            dir.resolve_recipients(&BTreeSet::new(), &BTreeSet::from([g]));
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name, "B");
    }

    #[test]
    fn test_resolution_dedupes_and_orders() {
        let mut dir = directory();
        let a = dir.add_contact("A", "111").unwrap();
        let b = dir.add_contact("B", "222").unwrap();
        // Group contains A again plus B.
        let g = dir.add_group("G", vec![a, b]).unwrap();

        let resolved =
            dir.resolve_recipients(&BTreeSet::from([a]), &BTreeSet::from([g]));
        assert_eq!(
            resolved.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            vec!["A", "B"]
        );
    }

    #[test]
    fn test_resolution_drops_stale_ids() {
        let mut dir = directory();
        let a = dir.add_contact("A", "111").unwrap();
        let resolved = dir.resolve_recipients(
            &BTreeSet::from([a, 9999]),
            &BTreeSet::from([4242]),
        );
        assert_eq!(resolved.len(), 1);
    }

    #[test]
    fn test_directory_persists_across_loads() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let id = {
            let mut dir = Directory::load(store.clone());
            dir.add_contact("A", "111").unwrap()
        };
        let dir = Directory::load(store);
        assert_eq!(dir.contacts().len(), 1);
        assert_eq!(dir.contacts()[0].id, id);
        // Ids never repeat after a reload.
        assert!(dir.next_id > id);
    }

    #[test]
    fn test_update_group_replaces_members() {
        let mut dir = directory();
        let a = dir.add_contact("A", "111").unwrap();
        let b = dir.add_contact("B", "222").unwrap();
        let g = dir.add_group("G", vec![a]).unwrap();

        dir.update_group(Group {
            id: g,
            name: "G2".to_string(),
            contact_ids: vec![b],
        });

        let group = dir.groups().iter().find(|gr| gr.id == g).unwrap();
        assert_eq!(group.name, "G2");
        assert_eq!(dir.contacts_for_group(group)[0].name, "B");
    }
}
