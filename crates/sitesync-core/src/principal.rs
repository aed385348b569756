//! User principals and authentication modes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::roles::SiteRole;

/// Authentication mode for a site user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Site-local username/password authentication.
    #[default]
    Default,
    /// SAML single sign-on.
    Saml,
    /// OpenID Connect single sign-on.
    OpenId,
    /// Site-local authentication with MFA enforced.
    DefaultMfa,
}

impl AuthMode {
    /// All authentication modes.
    #[must_use]
    pub fn all() -> &'static [AuthMode] {
        &[
            AuthMode::Default,
            AuthMode::Saml,
            AuthMode::OpenId,
            AuthMode::DefaultMfa,
        ]
    }

    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Default => "default",
            AuthMode::Saml => "saml",
            AuthMode::OpenId => "open_id",
            AuthMode::DefaultMfa => "default_mfa",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AuthMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "default" | "serverdefault" => Ok(AuthMode::Default),
            "saml" => Ok(AuthMode::Saml),
            "openid" => Ok(AuthMode::OpenId),
            "defaultmfa" | "tableauidwithmfa" => Ok(AuthMode::DefaultMfa),
            _ => Err(CoreError::UnknownAuthMode {
                name: s.to_string(),
            }),
        }
    }
}

/// A user identity discovered from the directory or targeted at the site.
///
/// Exactly one canonical principal exists per case-insensitive name within
/// a single reconciliation run; the aggregate enforces this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Unique name (email-style), case-insensitive key.
    pub name: String,
    /// Desired site role.
    pub role: SiteRole,
    /// Desired authentication mode.
    pub auth: AuthMode,
    /// Whether a site role higher than `role` is tolerated rather than
    /// corrected.
    #[serde(default)]
    pub allow_promoted_role: bool,
    /// The source group(s) this principal was discovered through.
    #[serde(default)]
    pub source_group: String,
}

impl Principal {
    /// Create a new principal.
    pub fn new(name: impl Into<String>, role: SiteRole, auth: AuthMode) -> Self {
        Self {
            name: name.into(),
            role,
            auth,
            allow_promoted_role: false,
            source_group: String::new(),
        }
    }

    /// Set the source group.
    #[must_use]
    pub fn with_source_group(mut self, group: impl Into<String>) -> Self {
        self.source_group = group.into();
        self
    }

    /// Allow a promoted site role to stand.
    #[must_use]
    pub fn with_promoted_role_allowed(mut self, allow: bool) -> Self {
        self.allow_promoted_role = allow;
        self
    }

    /// The case-insensitive lookup key for this principal.
    #[must_use]
    pub fn name_key(&self) -> String {
        name_key(&self.name)
    }

    /// Numeric rank of the desired role.
    #[must_use]
    pub fn rank(&self) -> u8 {
        self.role.rank()
    }
}

/// Normalizes a principal or group name into its case-insensitive key.
#[must_use]
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}
