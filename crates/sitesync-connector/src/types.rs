//! Connector wire types
//!
//! Plain data carried across the directory and site contracts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sitesync_core::{AuthMode, SiteRole};

/// How a rule's source name is matched against directory group names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Exact, case-insensitive name equality.
    #[default]
    Equals,
    /// Case-insensitive prefix match.
    StartsWith,
}

impl MatchMode {
    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMode::Equals => "equals",
            MatchMode::StartsWith => "starts_with",
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "equals" => Ok(MatchMode::Equals),
            "starts_with" | "startswith" => Ok(MatchMode::StartsWith),
            _ => Err(format!("unknown match mode: {s}")),
        }
    }
}

/// License-grant instruction for a site group.
///
/// `OnLogin` causes members to be licensed automatically at sign-in,
/// independent of explicit user records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GrantLicenseMode {
    /// Leave the group's grant mode untouched.
    #[default]
    Ignore,
    /// No automatic license grant.
    None,
    /// Grant the minimum role when a member signs in.
    OnLogin,
}

impl GrantLicenseMode {
    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantLicenseMode::Ignore => "ignore",
            GrantLicenseMode::None => "none",
            GrantLicenseMode::OnLogin => "on_login",
        }
    }
}

impl fmt::Display for GrantLicenseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GrantLicenseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ignore" => Ok(GrantLicenseMode::Ignore),
            "none" => Ok(GrantLicenseMode::None),
            "on_login" | "onlogin" => Ok(GrantLicenseMode::OnLogin),
            _ => Err(format!("unknown grant license mode: {s}")),
        }
    }
}

/// Reference to a directory group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupRef {
    /// Directory object id.
    pub id: String,
    /// Group display name.
    pub name: String,
}

impl GroupRef {
    /// Create a new group reference.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A user entry returned by a directory member listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    /// Directory object id.
    pub id: String,
    /// Principal name (email-style).
    pub name: String,
}

impl DirectoryUser {
    /// Create a new directory user.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// One member of a directory group: either a user or a nested group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DirectoryMember {
    /// A user principal.
    User(DirectoryUser),
    /// A nested group, triggering recursive enumeration.
    Group(GroupRef),
}

/// Opaque continuation token for sequential pagination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageToken(pub String);

/// One page of a group member listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemberPage {
    /// Members on this page.
    pub members: Vec<DirectoryMember>,
    /// Token for the next page; `None` when this is the last page.
    pub next: Option<PageToken>,
}

impl MemberPage {
    /// A terminal page with the given members.
    #[must_use]
    pub fn last(members: Vec<DirectoryMember>) -> Self {
        Self {
            members,
            next: None,
        }
    }
}

/// A user as it exists on the target site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteUser {
    /// Site-assigned id.
    pub id: Uuid,
    /// Principal name (case-insensitive key).
    pub name: String,
    /// Current site role.
    pub role: SiteRole,
    /// Current authentication mode.
    pub auth: AuthMode,
}

impl SiteUser {
    /// Create a new site user record.
    pub fn new(name: impl Into<String>, role: SiteRole, auth: AuthMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            role,
            auth,
        }
    }

    /// The case-insensitive lookup key.
    #[must_use]
    pub fn name_key(&self) -> String {
        sitesync_core::name_key(&self.name)
    }
}

/// A group as it exists on the target site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteGroup {
    /// Site-assigned id.
    pub id: Uuid,
    /// Group name (case-insensitive key).
    pub name: String,
    /// License-grant mode.
    pub grant_license_mode: GrantLicenseMode,
    /// Minimum role granted on login, when `grant_license_mode` is
    /// `OnLogin`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_role: Option<SiteRole>,
    /// Member names; populated only when members were requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<String>>,
}

impl SiteGroup {
    /// Create a new site group record.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            grant_license_mode: GrantLicenseMode::Ignore,
            minimum_role: None,
            members: None,
        }
    }

    /// The case-insensitive lookup key.
    #[must_use]
    pub fn name_key(&self) -> String {
        sitesync_core::name_key(&self.name)
    }
}

/// Content types whose ownership can be remapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// Published workbook.
    Workbook,
    /// Published data source.
    Datasource,
    /// Prep flow.
    Flow,
}

impl ContentType {
    /// All content types, in remap order.
    #[must_use]
    pub fn all() -> &'static [ContentType] {
        &[
            ContentType::Workbook,
            ContentType::Datasource,
            ContentType::Flow,
        ]
    }

    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Workbook => "workbook",
            ContentType::Datasource => "datasource",
            ContentType::Flow => "flow",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A content item on the site, carrying its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRef {
    /// Site-assigned id.
    pub id: Uuid,
    /// Item name.
    pub name: String,
    /// Owning user's site id.
    pub owner_id: Uuid,
    /// Kind of content.
    pub content_type: ContentType,
}
