//! Run orchestrator.
//!
//! Ties the pieces together for one reconciliation run: validate
//! configuration, aggregate the desired state, snapshot the site, execute
//! the user and group passes, and return the report. Fatal errors
//! (configuration, exact-match directory drift) abort before any site
//! mutation; per-entity errors are recorded and the run completes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use sitesync_connector::{DirectoryClient, SiteClient};

use crate::aggregator::Aggregator;
use crate::config::SyncConfig;
use crate::error::EngineResult;
use crate::executor::{GroupReconciler, UserReconciler};
use crate::ownership::OwnershipRemapper;
use crate::report::RunReport;
use crate::snapshot::SiteSnapshot;

/// Result of a completed reconciliation run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Run ID.
    pub run_id: Uuid,
    /// Every decision taken, with statistics.
    pub report: RunReport,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run completed.
    pub completed_at: DateTime<Utc>,
}

/// Reconciliation engine for one directory/site pair.
pub struct SyncEngine {
    directory: Arc<dyn DirectoryClient>,
    site: Arc<dyn SiteClient>,
}

impl SyncEngine {
    /// Create a new engine.
    pub fn new(directory: Arc<dyn DirectoryClient>, site: Arc<dyn SiteClient>) -> Self {
        Self { directory, site }
    }

    /// Execute one reconciliation run.
    pub async fn run(&self, config: &SyncConfig) -> EngineResult<RunOutcome> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        tracing::info!(
            run_id = %run_id,
            role_rules = config.role_rules.len(),
            group_rules = config.group_rules.len(),
            overrides = config.overrides.len(),
            "starting reconciliation run"
        );

        config.validate()?;

        let mut report = RunReport::new();

        // Everything up to here is read-only; an aggregation error aborts
        // before any site mutation.
        let desired = Aggregator::new(self.directory.clone(), config.max_depth)
            .build(config, &mut report)
            .await?;

        let mut snapshot = SiteSnapshot::load(self.site.as_ref()).await?;

        UserReconciler::new(self.site.as_ref(), &config.policies)
            .reconcile(&desired.roles, &mut snapshot, &mut report)
            .await;

        GroupReconciler::new(self.site.as_ref(), &config.policies)
            .reconcile(&desired.groups, &mut snapshot, &mut report)
            .await;

        let completed_at = Utc::now();
        report.statistics.duration_seconds =
            (completed_at - started_at).num_seconds().unsigned_abs();

        tracing::info!(
            run_id = %run_id,
            events = report.events.len(),
            errors = report.statistics.errors,
            in_sync = report.statistics.in_sync,
            "reconciliation run completed"
        );

        Ok(RunOutcome {
            run_id,
            report,
            started_at,
            completed_at,
        })
    }

    /// Reassign content ownership between principals. Independent of the
    /// reconciliation run; consumes only principal identities.
    pub async fn remap_ownership(&self, pairs: &[(String, String)]) -> RunReport {
        let mut report = RunReport::new();
        OwnershipRemapper::new(self.site.as_ref())
            .remap(pairs, &mut report)
            .await;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitesync_connector::memory::{MemoryDirectory, MemorySite};
    use sitesync_core::{AuthMode, SiteRole};

    use crate::config::{AuthPolicy, PolicyMatrix, RoleRule, UnexpectedAction};
    use crate::error::{ConfigError, EngineError};

    #[tokio::test]
    async fn test_invalid_config_aborts_before_mutation() {
        let directory = Arc::new(MemoryDirectory::new());
        let site = Arc::new(MemorySite::new());
        let engine = SyncEngine::new(directory, site.clone());

        let mut config = SyncConfig::new();
        config
            .role_rules
            .push(RoleRule::new("", SiteRole::Viewer, AuthMode::Default));

        let err = engine.run(&config).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Config(ConfigError::EmptySource)
        ));
        assert!(site.users().await.is_empty());
    }

    #[tokio::test]
    async fn test_directory_drift_aborts_before_mutation() {
        let directory = Arc::new(MemoryDirectory::new());
        let site = Arc::new(MemorySite::new());
        site.seed_user("stay@x.com", SiteRole::Viewer, AuthMode::Default)
            .await;
        let engine = SyncEngine::new(directory, site.clone());

        let mut config = SyncConfig::new();
        config
            .role_rules
            .push(RoleRule::new("Ghost", SiteRole::Viewer, AuthMode::Default));
        config.policies =
            PolicyMatrix::uniform(AuthPolicy::enforce(UnexpectedAction::Delete));

        let err = engine.run(&config).await.unwrap_err();
        assert!(err.is_fatal());
        // The unexpected user was never touched.
        assert_eq!(site.users().await.len(), 1);
    }
}
