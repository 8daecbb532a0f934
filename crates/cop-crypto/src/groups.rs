//! Group membership resolution.
//!
//! The core never mutates groups; it only takes membership snapshots at
//! protect time and share time. Snapshot freezing is what gives new members
//! no access to earlier envelopes and removed members no place in later
//! disclosures.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// An ordered member list frozen at the moment it was taken.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub group_id: String,
    pub members: Vec<String>,
}

/// Group metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupInfo {
    pub group_id: String,
    pub member_count: usize,
}

/// Snapshot-returning read interface over group membership.
pub trait GroupResolver: Send + Sync {
    /// The current member list of `group_id`, or `None` for unknown groups.
    fn snapshot(&self, group_id: &str) -> Option<GroupSnapshot>;

    fn info(&self, group_id: &str) -> Option<GroupInfo>;
}

/// Thread-safe in-memory group table with the mutators collaborators use.
#[derive(Default)]
pub struct InMemoryGroups {
    groups: RwLock<HashMap<String, Vec<String>>>,
}

impl InMemoryGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty group; no-op if it already exists.
    pub fn create(&self, group_id: &str) {
        self.groups
            .write()
            .expect("groups lock poisoned")
            .entry(group_id.to_string())
            .or_default();
    }

    /// Append a member, preserving insertion order. No-op on duplicates.
    pub fn add_member(&self, group_id: &str, name: &str) {
        let mut groups = self.groups.write().expect("groups lock poisoned");
        let members = groups.entry(group_id.to_string()).or_default();
        if !members.iter().any(|m| m == name) {
            members.push(name.to_string());
        }
    }

    pub fn remove_member(&self, group_id: &str, name: &str) {
        let mut groups = self.groups.write().expect("groups lock poisoned");
        if let Some(members) = groups.get_mut(group_id) {
            members.retain(|m| m != name);
        }
    }
}

impl GroupResolver for InMemoryGroups {
    fn snapshot(&self, group_id: &str) -> Option<GroupSnapshot> {
        self.groups
            .read()
            .expect("groups lock poisoned")
            .get(group_id)
            .map(|members| GroupSnapshot {
                group_id: group_id.to_string(),
                members: members.clone(),
            })
    }

    fn info(&self, group_id: &str) -> Option<GroupInfo> {
        self.groups
            .read()
            .expect("groups lock poisoned")
            .get(group_id)
            .map(|members| GroupInfo {
                group_id: group_id.to_string(),
                member_count: members.len(),
            })
    }
}
