//! Source configuration model.
//!
//! Typed, validated representation of role-sync rules, group-sync rules,
//! explicit overrides and the per-auth-type policy matrix. Loaded once
//! (from whatever format the host application uses) before a run starts.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use sitesync_connector::{GrantLicenseMode, MatchMode};
use sitesync_core::{name_key, AuthMode, Principal, SiteRole};

use crate::error::ConfigError;

/// Action for a desired principal absent from the site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingAction {
    /// Create the entity on the site.
    Add,
    /// Log only.
    #[default]
    Report,
}

/// Action for an entity present on both sides but different.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExistingAction {
    /// Correct the site entity.
    Modify,
    /// Log only.
    #[default]
    Report,
}

/// Action for a site entity no desired-state source names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnexpectedAction {
    /// Log only.
    #[default]
    Report,
    /// Demote the user to the unlicensed role, auth unchanged.
    Unlicense,
    /// Delete the entity; falls back to unlicense if the site refuses.
    Delete,
}

impl fmt::Display for MissingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingAction::Add => write!(f, "add"),
            MissingAction::Report => write!(f, "report"),
        }
    }
}

impl fmt::Display for ExistingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExistingAction::Modify => write!(f, "modify"),
            ExistingAction::Report => write!(f, "report"),
        }
    }
}

impl fmt::Display for UnexpectedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnexpectedAction::Report => write!(f, "report"),
            UnexpectedAction::Unlicense => write!(f, "unlicense"),
            UnexpectedAction::Delete => write!(f, "delete"),
        }
    }
}

/// Policy row for one authentication type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AuthPolicy {
    /// Action when the desired entity is missing from the site.
    #[serde(default)]
    pub missing: MissingAction,
    /// Action when the site entity exists but differs.
    #[serde(default)]
    pub existing: ExistingAction,
    /// Action when the site entity is not named by any source.
    #[serde(default)]
    pub unexpected: UnexpectedAction,
}

impl AuthPolicy {
    /// A policy that mutates nothing and reports everything.
    #[must_use]
    pub fn report_only() -> Self {
        Self::default()
    }

    /// A policy that fully converges the site.
    #[must_use]
    pub fn enforce(unexpected: UnexpectedAction) -> Self {
        Self {
            missing: MissingAction::Add,
            existing: ExistingAction::Modify,
            unexpected,
        }
    }
}

/// Per-auth-type action lookup, built once from configuration.
///
/// An explicit table rather than nested conditionals, so the matrix is
/// independently testable.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PolicyMatrix {
    /// Per-auth entries; auth types without an entry use `fallback`.
    #[serde(default)]
    pub entries: HashMap<AuthMode, AuthPolicy>,
    /// Policy for auth types with no explicit entry.
    #[serde(default)]
    pub fallback: AuthPolicy,
}

impl PolicyMatrix {
    /// A matrix applying one policy to every auth type.
    #[must_use]
    pub fn uniform(policy: AuthPolicy) -> Self {
        Self {
            entries: HashMap::new(),
            fallback: policy,
        }
    }

    /// Set the policy for one auth type.
    #[must_use]
    pub fn with_entry(mut self, auth: AuthMode, policy: AuthPolicy) -> Self {
        self.entries.insert(auth, policy);
        self
    }

    /// Look up the policy row for an auth type.
    #[must_use]
    pub fn policy_for(&self, auth: AuthMode) -> AuthPolicy {
        self.entries.get(&auth).copied().unwrap_or(self.fallback)
    }

    /// The policy row governing group-level decisions.
    ///
    /// Groups carry no auth mode to look up, so the fallback row is the
    /// group row; per-auth entries only affect user and membership
    /// actions.
    #[must_use]
    pub fn group_policy(&self) -> AuthPolicy {
        self.fallback
    }
}

/// License-grant instruction carried by a group rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GroupLicense {
    /// Grant mode applied when the group is created.
    #[serde(default)]
    pub mode: GrantLicenseMode,
    /// Minimum role granted on login, when mode is `OnLogin`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_role: Option<SiteRole>,
}

/// A role-sync rule: members of matching source groups get `role`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRule {
    /// Source group name or prefix.
    pub source: String,
    /// How `source` is matched against directory group names.
    #[serde(default)]
    pub match_mode: MatchMode,
    /// Role assigned to every discovered member.
    pub role: SiteRole,
    /// Authentication mode assigned to every discovered member.
    #[serde(default)]
    pub auth: AuthMode,
    /// Whether a higher site role is tolerated rather than corrected.
    #[serde(default)]
    pub allow_promoted_role: bool,
}

impl RoleRule {
    /// Create an exact-match role rule.
    pub fn new(source: impl Into<String>, role: SiteRole, auth: AuthMode) -> Self {
        Self {
            source: source.into(),
            match_mode: MatchMode::Equals,
            role,
            auth,
            allow_promoted_role: false,
        }
    }

    /// Use prefix matching for the source name.
    #[must_use]
    pub fn with_prefix_match(mut self) -> Self {
        self.match_mode = MatchMode::StartsWith;
        self
    }

    /// Tolerate an already-promoted site role.
    #[must_use]
    pub fn with_promoted_role_allowed(mut self) -> Self {
        self.allow_promoted_role = true;
        self
    }
}

/// A group-sync rule: members of matching source groups become members of
/// the target site group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRule {
    /// Source group name or prefix.
    pub source: String,
    /// How `source` is matched against directory group names.
    #[serde(default)]
    pub match_mode: MatchMode,
    /// Explicit target group name. When absent the matched source group's
    /// own name is used, which is the only option for pattern rules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// License-grant instruction for the target group.
    #[serde(default)]
    pub license: GroupLicense,
}

impl GroupRule {
    /// Create an exact-match group rule targeting the source's own name.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            match_mode: MatchMode::Equals,
            target: None,
            license: GroupLicense::default(),
        }
    }

    /// Use prefix matching for the source name.
    #[must_use]
    pub fn with_prefix_match(mut self) -> Self {
        self.match_mode = MatchMode::StartsWith;
        self
    }

    /// Set an explicit target group name.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Set the license-grant instruction.
    #[must_use]
    pub fn with_license(mut self, license: GroupLicense) -> Self {
        self.license = license;
        self
    }

    /// Target group name for a matched source group.
    #[must_use]
    pub fn target_name_for(&self, source_group_name: &str) -> String {
        self.target
            .clone()
            .unwrap_or_else(|| source_group_name.to_string())
    }

    /// The guaranteed target name, known only for exact-match rules.
    ///
    /// Pattern rules generate their target names from whatever groups the
    /// directory matched, so they cannot pre-seed empty groups.
    #[must_use]
    pub fn required_target_group_name(&self) -> Option<String> {
        match self.match_mode {
            MatchMode::Equals => Some(self.target_name_for(&self.source)),
            MatchMode::StartsWith => None,
        }
    }
}

fn default_max_depth() -> usize {
    10
}

/// Root configuration for a reconciliation run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncConfig {
    /// Role-sync rules.
    #[serde(default)]
    pub role_rules: Vec<RoleRule>,
    /// Group-sync rules.
    #[serde(default)]
    pub group_rules: Vec<GroupRule>,
    /// Always-authoritative explicit principals, applied after traversal.
    #[serde(default)]
    pub overrides: Vec<Principal>,
    /// Per-auth-type action matrix.
    #[serde(default)]
    pub policies: PolicyMatrix,
    /// Defensive bound on nested-group recursion depth.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl SyncConfig {
    /// Create an empty configuration with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_depth: default_max_depth(),
            ..Self::default()
        }
    }

    /// Check the configuration before a run starts.
    ///
    /// Failures here are fatal: the run aborts before any site mutation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for rule in &self.role_rules {
            if rule.source.trim().is_empty() {
                return Err(ConfigError::EmptySource);
            }
        }

        let mut seen_targets = HashMap::new();
        for rule in &self.group_rules {
            if rule.source.trim().is_empty() {
                return Err(ConfigError::EmptySource);
            }
            if let Some(target) = rule.required_target_group_name() {
                let key = name_key(&target);
                if seen_targets.insert(key, target.clone()).is_some() {
                    return Err(ConfigError::DuplicateTargetGroup { name: target });
                }
            }
        }

        for principal in &self.overrides {
            if principal.name.trim().is_empty() {
                return Err(ConfigError::EmptyOverrideName);
            }
        }

        if self.max_depth == 0 {
            return Err(ConfigError::InvalidLimit {
                message: "max_depth must be at least 1".into(),
            });
        }

        Ok(())
    }

    /// Every role referenced by configuration, for bucket pre-seeding.
    #[must_use]
    pub fn referenced_roles(&self) -> Vec<SiteRole> {
        let mut roles: Vec<SiteRole> = self
            .role_rules
            .iter()
            .map(|r| r.role)
            .chain(self.overrides.iter().map(|p| p.role))
            .collect();
        roles.sort();
        roles.dedup();
        roles
    }
}

impl FromStr for SyncConfig {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}
