//! Site state snapshot.
//!
//! An in-memory working copy of the target site's users and groups,
//! fetched at run start and mutated in place as operations succeed, so
//! later decisions within the same run see earlier outcomes. Never
//! persisted beyond the run.

use std::collections::BTreeMap;

use tracing::instrument;

use sitesync_connector::{ConnectorResult, SiteClient, SiteGroup, SiteUser};
use sitesync_core::name_key;

/// Working lists of the site's current users and groups, keyed
/// case-insensitively by name.
#[derive(Debug, Clone, Default)]
pub struct SiteSnapshot {
    users: BTreeMap<String, SiteUser>,
    groups: BTreeMap<String, SiteGroup>,
}

impl SiteSnapshot {
    /// Create an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the site's current state.
    #[instrument(skip(site))]
    pub async fn load(site: &dyn SiteClient) -> ConnectorResult<Self> {
        let mut snapshot = Self::new();
        for user in site.list_users().await? {
            snapshot.put_user(user);
        }
        for group in site.list_groups(true).await? {
            snapshot.put_group(group);
        }
        tracing::info!(
            users = snapshot.users.len(),
            groups = snapshot.groups.len(),
            "loaded site snapshot"
        );
        Ok(snapshot)
    }

    /// Look up a user by name.
    #[must_use]
    pub fn user(&self, name: &str) -> Option<&SiteUser> {
        self.users.get(&name_key(name))
    }

    /// Remove and return a user by name.
    pub fn take_user(&mut self, name: &str) -> Option<SiteUser> {
        self.users.remove(&name_key(name))
    }

    /// Remove a deleted user and scrub them from every group's member
    /// list, mirroring what the site does on user deletion so the group
    /// pass sees the same state the site holds.
    pub fn delete_user(&mut self, name: &str) -> Option<SiteUser> {
        let key = name_key(name);
        let user = self.users.remove(&key)?;
        for group in self.groups.values_mut() {
            if let Some(members) = &mut group.members {
                members.retain(|m| name_key(m) != key);
            }
        }
        Some(user)
    }

    /// Insert or replace a user record.
    pub fn put_user(&mut self, user: SiteUser) {
        self.users.insert(user.name_key(), user);
    }

    /// All users, ordered by name key.
    pub fn users(&self) -> impl Iterator<Item = &SiteUser> {
        self.users.values()
    }

    /// Names (keys) of all users, ordered.
    #[must_use]
    pub fn user_keys(&self) -> Vec<String> {
        self.users.keys().cloned().collect()
    }

    /// Look up a group by name.
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&SiteGroup> {
        self.groups.get(&name_key(name))
    }

    /// Remove and return a group by name.
    pub fn take_group(&mut self, name: &str) -> Option<SiteGroup> {
        self.groups.remove(&name_key(name))
    }

    /// Insert or replace a group record.
    pub fn put_group(&mut self, group: SiteGroup) {
        self.groups.insert(group.name_key(), group);
    }

    /// All groups, ordered by name key.
    pub fn groups(&self) -> impl Iterator<Item = &SiteGroup> {
        self.groups.values()
    }

    /// Number of users in the snapshot.
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Number of groups in the snapshot.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}
