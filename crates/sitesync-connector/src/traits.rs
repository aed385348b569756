//! Collaborator contracts
//!
//! Capability traits the reconciliation engine drives. Implementations wrap
//! whatever transport the deployment uses (Graph API, LDAP, REST, a file
//! manifest); the engine only sees these shapes.

use async_trait::async_trait;
use uuid::Uuid;

use sitesync_core::{AuthMode, SiteRole};

use crate::error::ConnectorResult;
use crate::types::{
    ContentRef, ContentType, GrantLicenseMode, GroupRef, MatchMode, MemberPage, PageToken,
    SiteGroup, SiteUser,
};

/// Paginated group/member lookup against an external identity provider.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Resolve a name or prefix to zero or more directory groups.
    ///
    /// An empty result is a legitimate answer for `StartsWith`; whether it
    /// is fatal for `Equals` is the caller's policy. "Group not found" for
    /// an id-based lookup is surfaced as
    /// [`ConnectorError::GroupNotFound`](crate::error::ConnectorError::GroupNotFound),
    /// never as an empty page.
    async fn resolve_groups(
        &self,
        pattern: &str,
        match_mode: MatchMode,
    ) -> ConnectorResult<Vec<GroupRef>>;

    /// List one page of a group's direct members.
    ///
    /// Pass `None` for the first page; pass the previous page's `next`
    /// token afterwards. Page requests for one group are strictly
    /// sequential: each token is only valid after the page that produced
    /// it.
    async fn list_members(
        &self,
        group: &GroupRef,
        page: Option<PageToken>,
    ) -> ConnectorResult<MemberPage>;
}

/// CRUD against the target analytics site.
///
/// Every call blocks the current unit of work until the site answers, and
/// returns a structured result. Expected conditions (duplicate create,
/// delete refused because the user owns content) are typed errors, never
/// panics.
#[async_trait]
pub trait SiteClient: Send + Sync {
    /// List all users on the site.
    async fn list_users(&self) -> ConnectorResult<Vec<SiteUser>>;

    /// Create a user. Fails with `DuplicateEntity` if the name is taken.
    async fn create_user(
        &self,
        name: &str,
        role: SiteRole,
        auth: AuthMode,
    ) -> ConnectorResult<SiteUser>;

    /// Update a user's role and authentication mode.
    async fn update_user(
        &self,
        user_id: Uuid,
        role: SiteRole,
        auth: AuthMode,
    ) -> ConnectorResult<SiteUser>;

    /// Delete a user. Fails with `OwnsContent` if the user owns content.
    async fn delete_user(&self, user_id: Uuid) -> ConnectorResult<()>;

    /// List all groups on the site, optionally with their member names.
    async fn list_groups(&self, include_members: bool) -> ConnectorResult<Vec<SiteGroup>>;

    /// Create a group with the given license-grant instruction.
    async fn create_group(
        &self,
        name: &str,
        grant: GrantLicenseMode,
        minimum_role: Option<SiteRole>,
    ) -> ConnectorResult<SiteGroup>;

    /// Update a group's license-grant instruction.
    async fn update_group(
        &self,
        group_id: Uuid,
        grant: GrantLicenseMode,
        minimum_role: Option<SiteRole>,
    ) -> ConnectorResult<SiteGroup>;

    /// Add a user to a group.
    async fn add_member(&self, group_id: Uuid, user_id: Uuid) -> ConnectorResult<()>;

    /// Remove a user from a group.
    async fn remove_member(&self, group_id: Uuid, user_id: Uuid) -> ConnectorResult<()>;

    /// List all content of one type, with owner ids.
    async fn list_content(&self, content_type: ContentType) -> ConnectorResult<Vec<ContentRef>>;

    /// Reassign a single content item to a new owner.
    async fn update_content_owner(
        &self,
        content: &ContentRef,
        new_owner_id: Uuid,
    ) -> ConnectorResult<()>;
}
