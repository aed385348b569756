//! Site role ranking and promotion rules.
//!
//! Roles form a total order used to resolve conflicts when the same
//! principal is discovered through multiple source groups.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A site access role, ordered from least to most privileged.
///
/// The derived `Ord` follows declaration order, so `rank()` comparisons and
/// direct comparisons agree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum SiteRole {
    /// No license assigned.
    #[default]
    Unlicensed,
    /// Read-only access.
    Viewer,
    /// Interact with published content.
    Explorer,
    /// Explorer who may also publish.
    ExplorerCanPublish,
    /// Full authoring capability.
    Creator,
    /// Site administrator with explorer-level authoring.
    SiteAdministratorExplorer,
    /// Site administrator with creator-level authoring.
    SiteAdministratorCreator,
    /// Server-wide administrator.
    ServerAdministrator,
}

impl SiteRole {
    /// All roles in rank order.
    #[must_use]
    pub fn all() -> &'static [SiteRole] {
        &[
            SiteRole::Unlicensed,
            SiteRole::Viewer,
            SiteRole::Explorer,
            SiteRole::ExplorerCanPublish,
            SiteRole::Creator,
            SiteRole::SiteAdministratorExplorer,
            SiteRole::SiteAdministratorCreator,
            SiteRole::ServerAdministrator,
        ]
    }

    /// Numeric rank, monotonic in privilege.
    #[must_use]
    pub fn rank(&self) -> u8 {
        *self as u8
    }

    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteRole::Unlicensed => "unlicensed",
            SiteRole::Viewer => "viewer",
            SiteRole::Explorer => "explorer",
            SiteRole::ExplorerCanPublish => "explorer_can_publish",
            SiteRole::Creator => "creator",
            SiteRole::SiteAdministratorExplorer => "site_administrator_explorer",
            SiteRole::SiteAdministratorCreator => "site_administrator_creator",
            SiteRole::ServerAdministrator => "server_administrator",
        }
    }

    /// Whether this role carries no license.
    #[must_use]
    pub fn is_unlicensed(&self) -> bool {
        matches!(self, SiteRole::Unlicensed)
    }
}

impl fmt::Display for SiteRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SiteRole {
    type Err = CoreError;

    /// Parses a role name case-insensitively, tolerating both snake_case
    /// and the CamelCase tokens the site API uses.
    ///
    /// The legacy `SiteAdministrator` token is an alias of
    /// `SiteAdministratorExplorer`; both label the same capability tier.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "unlicensed" => Ok(SiteRole::Unlicensed),
            "viewer" => Ok(SiteRole::Viewer),
            "explorer" => Ok(SiteRole::Explorer),
            "explorercanpublish" => Ok(SiteRole::ExplorerCanPublish),
            "creator" => Ok(SiteRole::Creator),
            "siteadministrator" | "siteadministratorexplorer" => {
                Ok(SiteRole::SiteAdministratorExplorer)
            }
            "siteadministratorcreator" => Ok(SiteRole::SiteAdministratorCreator),
            "serveradministrator" => Ok(SiteRole::ServerAdministrator),
            _ => Err(CoreError::UnknownRole {
                name: s.to_string(),
            }),
        }
    }
}

/// Whether a pair of ranks combines into site-administrator-creator.
///
/// True if either role already is `SiteAdministratorCreator`, or the pair is
/// exactly {`Creator`, `SiteAdministratorExplorer`} in either order. A user
/// who is Creator in one source group and site-admin-explorer in another
/// must end up with both capability sets, not whichever rank happens to be
/// numerically higher.
#[must_use]
pub fn is_combined_creator_administrator(a: SiteRole, b: SiteRole) -> bool {
    if a == SiteRole::SiteAdministratorCreator || b == SiteRole::SiteAdministratorCreator {
        return true;
    }

    matches!(
        (a, b),
        (SiteRole::Creator, SiteRole::SiteAdministratorExplorer)
            | (SiteRole::SiteAdministratorExplorer, SiteRole::Creator)
    )
}
