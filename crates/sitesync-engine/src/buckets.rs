//! Role and group buckets with conflict resolution.
//!
//! The aggregate owns the canonical desired state for one run: exactly one
//! principal per case-insensitive name across all role buckets, and one
//! member set per target group. All mutation goes through the methods here;
//! traversal branches hand in owned results and never touch bucket state
//! directly.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use sitesync_core::{is_combined_creator_administrator, name_key, Principal, SiteRole};

use crate::config::GroupLicense;

/// Outcome of adding a principal to the role aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The name was new; the principal was inserted.
    Added,
    /// A principal with equal or better rank already existed.
    KeptExisting,
    /// The new principal displaced the existing one.
    Replaced,
    /// The pair combined into a site-administrator-creator principal.
    Combined,
}

/// Principals assigned one role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleBucket {
    /// The role every member of this bucket is assigned.
    pub role: SiteRole,
    /// Principals keyed by case-insensitive name.
    pub principals: BTreeMap<String, Principal>,
}

impl RoleBucket {
    fn new(role: SiteRole) -> Self {
        Self {
            role,
            principals: BTreeMap::new(),
        }
    }

    /// Number of principals in this bucket.
    #[must_use]
    pub fn len(&self) -> usize {
        self.principals.len()
    }

    /// Whether this bucket has no principals.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }
}

/// All role buckets plus the name index enforcing one canonical principal
/// per case-insensitive name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleBuckets {
    buckets: BTreeMap<SiteRole, RoleBucket>,
    /// name key -> role bucket currently holding that principal.
    index: HashMap<String, SiteRole>,
}

impl RoleBuckets {
    /// Create an empty aggregate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure a bucket exists for `role`, so empty buckets referenced by
    /// configuration still appear in output.
    pub fn seed(&mut self, role: SiteRole) {
        self.buckets.entry(role).or_insert_with(|| RoleBucket::new(role));
    }

    /// Add a principal, resolving conflicts with any existing principal of
    /// the same name.
    ///
    /// The resolution sequence is order-sensitive and is NOT a plain
    /// `max()` over ranks:
    ///
    /// 1. equal rank: no-op
    /// 2. new rank is site-administrator-creator: replace outright
    /// 3. the pair combines (creator + site-admin-explorer): synthesize a
    ///    site-administrator-creator principal carrying both source groups
    ///    and the OR of both promotion flags
    /// 4. existing rank >= new rank: keep existing
    /// 5. otherwise: replace with the higher-ranked new principal
    pub fn add(&mut self, principal: Principal) -> AddOutcome {
        let key = principal.name_key();

        let Some(existing_role) = self.index.get(&key).copied() else {
            self.insert(key, principal);
            return AddOutcome::Added;
        };

        // The index said the principal is present; a missing entry here
        // would mean the index and buckets disagree.
        let existing = self
            .buckets
            .get(&existing_role)
            .and_then(|b| b.principals.get(&key))
            .cloned();
        let Some(existing) = existing else {
            self.insert(key, principal);
            return AddOutcome::Added;
        };

        if principal.role == existing.role {
            return AddOutcome::KeptExisting;
        }

        if principal.role == SiteRole::SiteAdministratorCreator {
            debug!(
                name = %principal.name,
                previous = %existing.role,
                "site-administrator-creator wins outright"
            );
            let merged = Principal {
                source_group: join_source_groups(&existing.source_group, &principal.source_group),
                ..principal
            };
            self.remove_key(&key);
            self.insert(key, merged);
            return AddOutcome::Replaced;
        }

        if is_combined_creator_administrator(existing.role, principal.role) {
            let combined = Principal {
                name: existing.name.clone(),
                role: SiteRole::SiteAdministratorCreator,
                auth: existing.auth,
                allow_promoted_role: existing.allow_promoted_role
                    || principal.allow_promoted_role,
                source_group: join_source_groups(&existing.source_group, &principal.source_group),
            };
            debug!(
                name = %combined.name,
                left = %existing.role,
                right = %principal.role,
                "combined into site-administrator-creator"
            );
            self.remove_key(&key);
            self.insert(key, combined);
            return AddOutcome::Combined;
        }

        if existing.rank() >= principal.rank() {
            return AddOutcome::KeptExisting;
        }

        debug!(
            name = %principal.name,
            from = %existing.role,
            to = %principal.role,
            "higher-ranked principal replaces existing"
        );
        self.remove_key(&key);
        self.insert(key, principal);
        AddOutcome::Replaced
    }

    /// Unconditional replace-or-add, bypassing rank comparison. Used for
    /// the always-authoritative override list.
    pub fn apply_override(&mut self, principal: Principal) {
        let key = principal.name_key();
        self.remove_key(&key);
        self.insert(key, principal);
    }

    /// Look up the canonical principal for a name.
    #[must_use]
    pub fn principal(&self, name: &str) -> Option<&Principal> {
        let key = name_key(name);
        let role = self.index.get(&key)?;
        self.buckets.get(role)?.principals.get(&key)
    }

    /// All buckets in rank order, including seeded empty ones.
    pub fn buckets(&self) -> impl Iterator<Item = &RoleBucket> {
        self.buckets.values()
    }

    /// All canonical principals, ordered by name key.
    #[must_use]
    pub fn principals(&self) -> BTreeMap<String, &Principal> {
        self.buckets
            .values()
            .flat_map(|b| b.principals.iter())
            .map(|(k, p)| (k.clone(), p))
            .collect()
    }

    /// Whether the aggregate names this principal.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&name_key(name))
    }

    /// Total principal count across buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether no principal has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn insert(&mut self, key: String, principal: Principal) {
        let role = principal.role;
        self.buckets
            .entry(role)
            .or_insert_with(|| RoleBucket::new(role))
            .principals
            .insert(key.clone(), principal);
        self.index.insert(key, role);
    }

    fn remove_key(&mut self, key: &str) {
        if let Some(role) = self.index.remove(key) {
            if let Some(bucket) = self.buckets.get_mut(&role) {
                bucket.principals.remove(key);
            }
        }
    }
}

fn join_source_groups(existing: &str, new: &str) -> String {
    if existing.is_empty() {
        new.to_string()
    } else if new.is_empty() || existing == new {
        existing.to_string()
    } else {
        format!("{existing} + {new}")
    }
}

/// Desired members of one target site group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupBucket {
    /// Target group name.
    pub name: String,
    /// Member names keyed by case-insensitive key.
    pub members: BTreeMap<String, String>,
    /// License-grant instruction applied if the group is created.
    pub license: GroupLicense,
}

impl GroupBucket {
    fn new(name: &str, license: GroupLicense) -> Self {
        Self {
            name: name.to_string(),
            members: BTreeMap::new(),
            license,
        }
    }

    /// Member count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the group has no desired members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether `name` is a desired member.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.members.contains_key(&name_key(name))
    }
}

/// All group buckets, keyed by case-insensitive target name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupBuckets {
    buckets: BTreeMap<String, GroupBucket>,
}

impl GroupBuckets {
    /// Create an empty aggregate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure a bucket exists for `name`, so explicitly named target
    /// groups are represented even with zero members.
    pub fn seed(&mut self, name: &str, license: GroupLicense) {
        self.buckets
            .entry(name_key(name))
            .or_insert_with(|| GroupBucket::new(name, license));
    }

    /// Add a member to a target group; membership is a set union.
    pub fn add_member(&mut self, group_name: &str, license: GroupLicense, member_name: &str) {
        let bucket = self
            .buckets
            .entry(name_key(group_name))
            .or_insert_with(|| GroupBucket::new(group_name, license));
        bucket
            .members
            .entry(name_key(member_name))
            .or_insert_with(|| member_name.to_string());
    }

    /// Look up one bucket by target name.
    #[must_use]
    pub fn bucket(&self, name: &str) -> Option<&GroupBucket> {
        self.buckets.get(&name_key(name))
    }

    /// All buckets, ordered by name key.
    pub fn buckets(&self) -> impl Iterator<Item = &GroupBucket> {
        self.buckets.values()
    }

    /// Bucket count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether no bucket exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
