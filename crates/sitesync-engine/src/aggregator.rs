//! Desired-state aggregation.
//!
//! Resolves each sync rule against the directory, walks the resolved
//! groups, and collapses everything into conflict-resolved role and group
//! buckets. Explicit overrides are applied last and unconditionally.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use sitesync_connector::{DirectoryClient, MatchMode};
use sitesync_core::Principal;

use crate::buckets::{GroupBuckets, RoleBuckets};
use crate::config::SyncConfig;
use crate::error::{EngineError, EngineResult};
use crate::report::{ChangeKind, ReportArea, ReportEvent, RunReport};
use crate::walker::DirectoryWalker;

/// The collapsed desired state for one run.
#[derive(Debug, Clone, Default)]
pub struct DesiredState {
    /// Desired users by role.
    pub roles: RoleBuckets,
    /// Desired site-group memberships.
    pub groups: GroupBuckets,
}

/// Builds the desired state from configuration and the directory.
pub struct Aggregator {
    walker: DirectoryWalker,
    directory: Arc<dyn DirectoryClient>,
}

impl Aggregator {
    /// Create an aggregator over the given directory.
    pub fn new(directory: Arc<dyn DirectoryClient>, max_depth: usize) -> Self {
        Self {
            walker: DirectoryWalker::new(directory.clone(), max_depth),
            directory,
        }
    }

    /// Build the desired state.
    ///
    /// An exact-match rule resolving to no group is fatal (configuration
    /// drift); a pattern rule matching nothing is recorded and skipped.
    /// No site mutation has happened yet when this returns an error.
    #[instrument(skip_all)]
    pub async fn build(
        &self,
        config: &SyncConfig,
        report: &mut RunReport,
    ) -> EngineResult<DesiredState> {
        let mut state = DesiredState::default();

        for role in config.referenced_roles() {
            state.roles.seed(role);
        }
        for rule in &config.group_rules {
            if let Some(target) = rule.required_target_group_name() {
                state.groups.seed(&target, rule.license);
            }
        }

        for rule in &config.role_rules {
            let groups = self
                .resolve_rule(&rule.source, rule.match_mode, report)
                .await?;

            for group in groups {
                let users = self.walker.collect_users(group.clone()).await?;
                info!(
                    rule = %rule.source,
                    group = %group.name,
                    users = users.len(),
                    "aggregating role rule"
                );
                for user in users {
                    let principal = Principal::new(user.name, rule.role, rule.auth)
                        .with_source_group(group.name.clone())
                        .with_promoted_role_allowed(rule.allow_promoted_role);
                    state.roles.add(principal);
                }
            }
        }

        for rule in &config.group_rules {
            let groups = self
                .resolve_rule(&rule.source, rule.match_mode, report)
                .await?;

            for group in groups {
                let target = rule.target_name_for(&group.name);
                let users = self.walker.collect_users(group.clone()).await?;
                info!(
                    rule = %rule.source,
                    group = %group.name,
                    target = %target,
                    members = users.len(),
                    "aggregating group rule"
                );
                for user in users {
                    state.groups.add_member(&target, rule.license, &user.name);
                }
            }
        }

        for principal in &config.overrides {
            state.roles.apply_override(principal.clone());
        }

        info!(
            principals = state.roles.len(),
            groups = state.groups.len(),
            "desired state aggregated"
        );

        Ok(state)
    }

    async fn resolve_rule(
        &self,
        source: &str,
        match_mode: MatchMode,
        report: &mut RunReport,
    ) -> EngineResult<Vec<sitesync_connector::GroupRef>> {
        let groups = self.directory.resolve_groups(source, match_mode).await?;

        if groups.is_empty() {
            match match_mode {
                MatchMode::Equals => {
                    return Err(EngineError::DirectoryNotFound {
                        pattern: source.to_string(),
                    });
                }
                MatchMode::StartsWith => {
                    warn!(pattern = %source, "pattern rule matched no directory groups");
                    report.push(
                        ReportEvent::new(ReportArea::Config, source, ChangeKind::Reported)
                            .with_note("pattern matched no directory groups"),
                    );
                }
            }
        }

        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitesync_connector::memory::MemoryDirectory;
    use sitesync_connector::types::{DirectoryMember, DirectoryUser};
    use sitesync_core::{AuthMode, SiteRole};

    use crate::config::{GroupRule, RoleRule};

    fn user(id: &str, name: &str) -> DirectoryMember {
        DirectoryMember::User(DirectoryUser::new(id, name))
    }

    fn config_with_role_rule(rule: RoleRule) -> SyncConfig {
        let mut config = SyncConfig::new();
        config.role_rules.push(rule);
        config
    }

    #[tokio::test]
    async fn test_role_rule_populates_bucket() {
        let dir = MemoryDirectory::new()
            .with_group("Analysts", vec![user("u1", "a@x.com"), user("u2", "b@x.com")]);
        let aggregator = Aggregator::new(Arc::new(dir), 10);
        let config = config_with_role_rule(RoleRule::new(
            "Analysts",
            SiteRole::Explorer,
            AuthMode::Saml,
        ));

        let mut report = RunReport::new();
        let state = aggregator.build(&config, &mut report).await.unwrap();

        assert_eq!(state.roles.len(), 2);
        let p = state.roles.principal("a@x.com").unwrap();
        assert_eq!(p.role, SiteRole::Explorer);
        assert_eq!(p.auth, AuthMode::Saml);
        assert_eq!(p.source_group, "Analysts");
    }

    #[tokio::test]
    async fn test_exact_match_miss_is_fatal() {
        let dir = MemoryDirectory::new();
        let aggregator = Aggregator::new(Arc::new(dir), 10);
        let config = config_with_role_rule(RoleRule::new(
            "Ghost",
            SiteRole::Viewer,
            AuthMode::Default,
        ));

        let mut report = RunReport::new();
        let err = aggregator.build(&config, &mut report).await.unwrap_err();
        assert!(matches!(err, EngineError::DirectoryNotFound { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_pattern_miss_is_logged_not_fatal() {
        let dir = MemoryDirectory::new();
        let aggregator = Aggregator::new(Arc::new(dir), 10);
        let config = config_with_role_rule(
            RoleRule::new("Ghost", SiteRole::Viewer, AuthMode::Default).with_prefix_match(),
        );

        let mut report = RunReport::new();
        let state = aggregator.build(&config, &mut report).await.unwrap();
        assert!(state.roles.is_empty());
        assert_eq!(
            report.statistics.count(ReportArea::Config, ChangeKind::Reported),
            1
        );
    }

    #[tokio::test]
    async fn test_duplicate_discovery_resolves_to_higher_rank() {
        let dir = MemoryDirectory::new()
            .with_group("Viewers", vec![user("u1", "a@x.com")])
            .with_group("Creators", vec![user("u1", "a@x.com")]);
        let aggregator = Aggregator::new(Arc::new(dir), 10);

        let mut config = SyncConfig::new();
        config
            .role_rules
            .push(RoleRule::new("Viewers", SiteRole::Viewer, AuthMode::Default));
        config
            .role_rules
            .push(RoleRule::new("Creators", SiteRole::Creator, AuthMode::Default));

        let mut report = RunReport::new();
        let state = aggregator.build(&config, &mut report).await.unwrap();
        assert_eq!(state.roles.len(), 1);
        assert_eq!(
            state.roles.principal("a@x.com").unwrap().role,
            SiteRole::Creator
        );
    }

    #[tokio::test]
    async fn test_overrides_applied_last() {
        let dir = MemoryDirectory::new().with_group("Admins", vec![user("u1", "a@x.com")]);
        let aggregator = Aggregator::new(Arc::new(dir), 10);

        let mut config = SyncConfig::new();
        config.role_rules.push(RoleRule::new(
            "Admins",
            SiteRole::ServerAdministrator,
            AuthMode::Default,
        ));
        config.overrides.push(
            Principal::new("a@x.com", SiteRole::Viewer, AuthMode::Saml)
                .with_source_group("override"),
        );

        let mut report = RunReport::new();
        let state = aggregator.build(&config, &mut report).await.unwrap();
        let p = state.roles.principal("a@x.com").unwrap();
        assert_eq!(p.role, SiteRole::Viewer);
        assert_eq!(p.auth, AuthMode::Saml);
    }

    #[tokio::test]
    async fn test_exact_group_rule_seeded_when_empty() {
        let dir = MemoryDirectory::new().with_group("Empty Team", vec![]);
        let aggregator = Aggregator::new(Arc::new(dir), 10);

        let mut config = SyncConfig::new();
        config.group_rules.push(GroupRule::new("Empty Team"));

        let mut report = RunReport::new();
        let state = aggregator.build(&config, &mut report).await.unwrap();
        let bucket = state.groups.bucket("Empty Team").unwrap();
        assert!(bucket.is_empty());
    }

    #[tokio::test]
    async fn test_pattern_group_rule_targets_matched_names() {
        let dir = MemoryDirectory::new()
            .with_group("Sales EU", vec![user("u1", "eu@x.com")])
            .with_group("Sales US", vec![user("u2", "us@x.com")]);
        let aggregator = Aggregator::new(Arc::new(dir), 10);

        let mut config = SyncConfig::new();
        config
            .group_rules
            .push(GroupRule::new("Sales").with_prefix_match());

        let mut report = RunReport::new();
        let state = aggregator.build(&config, &mut report).await.unwrap();
        assert_eq!(state.groups.len(), 2);
        assert!(state.groups.bucket("Sales EU").unwrap().contains("eu@x.com"));
        assert!(state.groups.bucket("Sales US").unwrap().contains("us@x.com"));
    }
}
