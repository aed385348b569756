//! In-memory collaborators
//!
//! Self-contained implementations of [`DirectoryClient`] and [`SiteClient`]
//! backed by plain maps. The engine's tests drive these, and a dry run can
//! point the executor at a [`MemorySite`] seeded from a live snapshot.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use sitesync_core::{name_key, AuthMode, SiteRole};

use crate::error::{ConnectorError, ConnectorResult};
use crate::traits::{DirectoryClient, SiteClient};
use crate::types::{
    ContentRef, ContentType, DirectoryMember, GrantLicenseMode, GroupRef, MatchMode, MemberPage,
    PageToken, SiteGroup, SiteUser,
};

/// An in-memory directory of groups with nested membership.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    /// Groups keyed by case-insensitive name.
    groups: HashMap<String, (GroupRef, Vec<DirectoryMember>)>,
    /// Members served per page; 0 means everything on one page.
    page_size: usize,
}

impl MemoryDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve member listings in pages of `size` entries.
    #[must_use]
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    /// Add a group with the given members.
    #[must_use]
    pub fn with_group(mut self, name: &str, members: Vec<DirectoryMember>) -> Self {
        let group = GroupRef::new(format!("dir-{}", self.groups.len() + 1), name);
        self.groups.insert(name_key(name), (group, members));
        self
    }
}

#[async_trait]
impl DirectoryClient for MemoryDirectory {
    async fn resolve_groups(
        &self,
        pattern: &str,
        match_mode: MatchMode,
    ) -> ConnectorResult<Vec<GroupRef>> {
        let pattern_key = name_key(pattern);
        let mut matched: Vec<GroupRef> = self
            .groups
            .iter()
            .filter(|(key, _)| match match_mode {
                MatchMode::Equals => **key == pattern_key,
                MatchMode::StartsWith => key.starts_with(&pattern_key),
            })
            .map(|(_, (group, _))| group.clone())
            .collect();
        matched.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(matched)
    }

    async fn list_members(
        &self,
        group: &GroupRef,
        page: Option<PageToken>,
    ) -> ConnectorResult<MemberPage> {
        let (_, members) = self
            .groups
            .values()
            .find(|(g, _)| g.id == group.id)
            .ok_or_else(|| ConnectorError::GroupNotFound {
                name: group.name.clone(),
            })?;

        if self.page_size == 0 {
            if page.is_some() {
                return Err(ConnectorError::InvalidPage {
                    message: "no continuation expected for unpaged listing".into(),
                });
            }
            return Ok(MemberPage::last(members.clone()));
        }

        let offset = match page {
            None => 0,
            Some(PageToken(token)) => {
                token
                    .parse::<usize>()
                    .map_err(|_| ConnectorError::InvalidPage {
                        message: format!("malformed token '{token}'"),
                    })?
            }
        };

        let end = (offset + self.page_size).min(members.len());
        let next = if end < members.len() {
            Some(PageToken(end.to_string()))
        } else {
            None
        };

        Ok(MemberPage {
            members: members[offset..end].to_vec(),
            next,
        })
    }
}

#[derive(Debug, Default)]
struct SiteState {
    users: Vec<SiteUser>,
    groups: Vec<SiteGroup>,
    content: Vec<ContentRef>,
}

/// An in-memory analytics site.
#[derive(Debug, Default)]
pub struct MemorySite {
    state: Mutex<SiteState>,
}

impl MemorySite {
    /// Create an empty site.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user, returning its id.
    pub async fn seed_user(&self, name: &str, role: SiteRole, auth: AuthMode) -> Uuid {
        let user = SiteUser::new(name, role, auth);
        let id = user.id;
        self.state.lock().await.users.push(user);
        id
    }

    /// Seed a group with member names.
    pub async fn seed_group(&self, name: &str, members: Vec<String>) -> Uuid {
        let mut group = SiteGroup::new(name);
        group.members = Some(members);
        let id = group.id;
        self.state.lock().await.groups.push(group);
        id
    }

    /// Seed a content item owned by `owner_id`.
    pub async fn seed_content(&self, content_type: ContentType, name: &str, owner_id: Uuid) -> Uuid {
        let item = ContentRef {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner_id,
            content_type,
        };
        let id = item.id;
        self.state.lock().await.content.push(item);
        id
    }

    /// Snapshot of current users, for assertions.
    pub async fn users(&self) -> Vec<SiteUser> {
        self.state.lock().await.users.clone()
    }

    /// Snapshot of current groups, for assertions.
    pub async fn groups(&self) -> Vec<SiteGroup> {
        self.state.lock().await.groups.clone()
    }

    /// Snapshot of current content, for assertions.
    pub async fn content(&self) -> Vec<ContentRef> {
        self.state.lock().await.content.clone()
    }
}

#[async_trait]
impl SiteClient for MemorySite {
    async fn list_users(&self) -> ConnectorResult<Vec<SiteUser>> {
        Ok(self.state.lock().await.users.clone())
    }

    async fn create_user(
        &self,
        name: &str,
        role: SiteRole,
        auth: AuthMode,
    ) -> ConnectorResult<SiteUser> {
        let mut state = self.state.lock().await;
        let key = name_key(name);
        if state.users.iter().any(|u| u.name_key() == key) {
            return Err(ConnectorError::DuplicateEntity {
                entity_kind: "user".into(),
                name: name.to_string(),
            });
        }
        let user = SiteUser::new(name, role, auth);
        state.users.push(user.clone());
        Ok(user)
    }

    async fn update_user(
        &self,
        user_id: Uuid,
        role: SiteRole,
        auth: AuthMode,
    ) -> ConnectorResult<SiteUser> {
        let mut state = self.state.lock().await;
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| ConnectorError::UserNotFound {
                name: user_id.to_string(),
            })?;
        user.role = role;
        user.auth = auth;
        Ok(user.clone())
    }

    async fn delete_user(&self, user_id: Uuid) -> ConnectorResult<()> {
        let mut state = self.state.lock().await;
        let user = state
            .users
            .iter()
            .find(|u| u.id == user_id)
            .ok_or_else(|| ConnectorError::UserNotFound {
                name: user_id.to_string(),
            })?
            .clone();

        if state.content.iter().any(|c| c.owner_id == user_id) {
            return Err(ConnectorError::OwnsContent { name: user.name });
        }

        state.users.retain(|u| u.id != user_id);
        let key = user.name_key();
        for group in &mut state.groups {
            if let Some(members) = &mut group.members {
                members.retain(|m| name_key(m) != key);
            }
        }
        Ok(())
    }

    async fn list_groups(&self, include_members: bool) -> ConnectorResult<Vec<SiteGroup>> {
        let state = self.state.lock().await;
        Ok(state
            .groups
            .iter()
            .map(|g| {
                let mut group = g.clone();
                if !include_members {
                    group.members = None;
                }
                group
            })
            .collect())
    }

    async fn create_group(
        &self,
        name: &str,
        grant: GrantLicenseMode,
        minimum_role: Option<SiteRole>,
    ) -> ConnectorResult<SiteGroup> {
        let mut state = self.state.lock().await;
        let key = name_key(name);
        if state.groups.iter().any(|g| g.name_key() == key) {
            return Err(ConnectorError::DuplicateEntity {
                entity_kind: "group".into(),
                name: name.to_string(),
            });
        }
        let mut group = SiteGroup::new(name);
        group.grant_license_mode = grant;
        group.minimum_role = minimum_role;
        group.members = Some(Vec::new());
        state.groups.push(group.clone());
        Ok(group)
    }

    async fn update_group(
        &self,
        group_id: Uuid,
        grant: GrantLicenseMode,
        minimum_role: Option<SiteRole>,
    ) -> ConnectorResult<SiteGroup> {
        let mut state = self.state.lock().await;
        let group = state
            .groups
            .iter_mut()
            .find(|g| g.id == group_id)
            .ok_or_else(|| ConnectorError::GroupNotFound {
                name: group_id.to_string(),
            })?;
        group.grant_license_mode = grant;
        group.minimum_role = minimum_role;
        Ok(group.clone())
    }

    async fn add_member(&self, group_id: Uuid, user_id: Uuid) -> ConnectorResult<()> {
        let mut state = self.state.lock().await;
        let user_name = state
            .users
            .iter()
            .find(|u| u.id == user_id)
            .ok_or_else(|| ConnectorError::UserNotFound {
                name: user_id.to_string(),
            })?
            .name
            .clone();
        let group = state
            .groups
            .iter_mut()
            .find(|g| g.id == group_id)
            .ok_or_else(|| ConnectorError::GroupNotFound {
                name: group_id.to_string(),
            })?;
        let members = group.members.get_or_insert_with(Vec::new);
        let key = name_key(&user_name);
        if !members.iter().any(|m| name_key(m) == key) {
            members.push(user_name);
        }
        Ok(())
    }

    async fn remove_member(&self, group_id: Uuid, user_id: Uuid) -> ConnectorResult<()> {
        let mut state = self.state.lock().await;
        let user_key = state
            .users
            .iter()
            .find(|u| u.id == user_id)
            .ok_or_else(|| ConnectorError::UserNotFound {
                name: user_id.to_string(),
            })?
            .name_key();
        let group = state
            .groups
            .iter_mut()
            .find(|g| g.id == group_id)
            .ok_or_else(|| ConnectorError::GroupNotFound {
                name: group_id.to_string(),
            })?;
        if let Some(members) = &mut group.members {
            members.retain(|m| name_key(m) != user_key);
        }
        Ok(())
    }

    async fn list_content(&self, content_type: ContentType) -> ConnectorResult<Vec<ContentRef>> {
        let state = self.state.lock().await;
        Ok(state
            .content
            .iter()
            .filter(|c| c.content_type == content_type)
            .cloned()
            .collect())
    }

    async fn update_content_owner(
        &self,
        content: &ContentRef,
        new_owner_id: Uuid,
    ) -> ConnectorResult<()> {
        let mut state = self.state.lock().await;
        if !state.users.iter().any(|u| u.id == new_owner_id) {
            return Err(ConnectorError::UserNotFound {
                name: new_owner_id.to_string(),
            });
        }
        let item = state
            .content
            .iter_mut()
            .find(|c| c.id == content.id)
            .ok_or_else(|| ConnectorError::rejected(format!("unknown content {}", content.id)))?;
        item.owner_id = new_owner_id;
        Ok(())
    }
}
