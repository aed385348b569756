//! User/role reconciliation.
//!
//! Per existing-site user name, evaluated against the desired principal of
//! the same name: missing, auth-mismatch, role-mismatch and unexpected
//! states each map to an action through the policy matrix. Every mutation
//! attempt produces exactly one report event.

use tracing::{debug, instrument, warn};

use sitesync_connector::{SiteClient, SiteUser};
use sitesync_core::{Principal, SiteRole};

use crate::buckets::RoleBuckets;
use crate::config::{ExistingAction, MissingAction, PolicyMatrix, UnexpectedAction};
use crate::report::{ChangeKind, ReportArea, ReportEvent, RunReport};
use crate::snapshot::SiteSnapshot;

fn describe(role: SiteRole, auth: sitesync_core::AuthMode) -> String {
    format!("{role}/{auth}")
}

/// Diff/apply pass for the user/role domain.
pub struct UserReconciler<'a> {
    site: &'a dyn SiteClient,
    policy: &'a PolicyMatrix,
}

impl<'a> UserReconciler<'a> {
    /// Create a reconciler over the given site client and policy.
    pub fn new(site: &'a dyn SiteClient, policy: &'a PolicyMatrix) -> Self {
        Self { site, policy }
    }

    /// Run the full user pass: explicit desired list first, then
    /// unexpected site users. Per-entity failures are recorded and the
    /// pass continues.
    #[instrument(skip_all)]
    pub async fn reconcile(
        &self,
        desired: &RoleBuckets,
        snapshot: &mut SiteSnapshot,
        report: &mut RunReport,
    ) {
        for (_, principal) in desired.principals() {
            self.reconcile_one(principal, snapshot, report).await;
        }

        // Site users no desired-state source names, in deterministic order.
        let unexpected: Vec<String> = snapshot
            .user_keys()
            .into_iter()
            .filter(|key| !desired.contains(key))
            .collect();

        for key in unexpected {
            self.handle_unexpected(&key, snapshot, report).await;
        }
    }

    async fn reconcile_one(
        &self,
        principal: &Principal,
        snapshot: &mut SiteSnapshot,
        report: &mut RunReport,
    ) {
        let policy = self.policy.policy_for(principal.auth);

        let Some(existing) = snapshot.user(&principal.name).cloned() else {
            match policy.missing {
                MissingAction::Add => {
                    self.create_user(principal, snapshot, report).await;
                }
                MissingAction::Report => {
                    report.push(
                        ReportEvent::new(ReportArea::User, &principal.name, ChangeKind::Reported)
                            .with_after(describe(principal.role, principal.auth))
                            .with_note("missing from site"),
                    );
                }
            }
            return;
        };

        if existing.auth != principal.auth {
            // Auth changes are never suppressed by promotion logic, but a
            // tolerated promoted role is preserved while the auth is fixed.
            let target_role = if principal.allow_promoted_role
                && existing.role.rank() > principal.rank()
            {
                existing.role
            } else {
                principal.role
            };
            self.update_user(&existing, target_role, principal.auth, None, snapshot, report)
                .await;
            return;
        }

        if existing.role != principal.role {
            if principal.allow_promoted_role && existing.role.rank() > principal.rank() {
                debug!(
                    user = %principal.name,
                    site = %existing.role,
                    desired = %principal.role,
                    "promoted role tolerated"
                );
                report.note_in_sync();
                return;
            }

            match policy.existing {
                ExistingAction::Modify => {
                    self.update_user(
                        &existing,
                        principal.role,
                        principal.auth,
                        None,
                        snapshot,
                        report,
                    )
                    .await;
                }
                ExistingAction::Report => {
                    report.push(
                        ReportEvent::new(ReportArea::User, &principal.name, ChangeKind::Reported)
                            .with_before(describe(existing.role, existing.auth))
                            .with_after(describe(principal.role, principal.auth))
                            .with_note("role differs"),
                    );
                }
            }
            return;
        }

        report.note_in_sync();
    }

    async fn handle_unexpected(
        &self,
        key: &str,
        snapshot: &mut SiteSnapshot,
        report: &mut RunReport,
    ) {
        let Some(user) = snapshot.user(key).cloned() else {
            // Removed earlier in this same pass.
            return;
        };
        let policy = self.policy.policy_for(user.auth);

        match policy.unexpected {
            UnexpectedAction::Report => {
                report.push(
                    ReportEvent::new(ReportArea::User, &user.name, ChangeKind::Reported)
                        .with_before(describe(user.role, user.auth))
                        .with_note("unexpected user"),
                );
            }
            UnexpectedAction::Unlicense => {
                if user.role.is_unlicensed() {
                    report.note_in_sync();
                } else {
                    self.unlicense(&user, None, snapshot, report).await;
                }
            }
            UnexpectedAction::Delete => {
                match self.site.delete_user(user.id).await {
                    Ok(()) => {
                        snapshot.delete_user(&user.name);
                        report.push(
                            ReportEvent::new(ReportArea::User, &user.name, ChangeKind::Removed)
                                .with_before(describe(user.role, user.auth)),
                        );
                    }
                    Err(e) if !user.role.is_unlicensed() => {
                        warn!(user = %user.name, error = %e, "delete refused, unlicensing instead");
                        self.unlicense(
                            &user,
                            Some(format!("delete refused: {e}")),
                            snapshot,
                            report,
                        )
                        .await;
                    }
                    Err(e) => {
                        report.push(
                            ReportEvent::new(ReportArea::User, &user.name, ChangeKind::Error)
                                .with_note(format!("delete failed: {e}")),
                        );
                    }
                }
            }
        }
    }

    async fn create_user(
        &self,
        principal: &Principal,
        snapshot: &mut SiteSnapshot,
        report: &mut RunReport,
    ) {
        match self
            .site
            .create_user(&principal.name, principal.role, principal.auth)
            .await
        {
            Ok(user) => {
                report.push(
                    ReportEvent::new(ReportArea::User, &principal.name, ChangeKind::Added)
                        .with_after(describe(user.role, user.auth)),
                );
                snapshot.put_user(user);
            }
            Err(e) => {
                report.push(
                    ReportEvent::new(ReportArea::User, &principal.name, ChangeKind::Error)
                        .with_note(format!("create failed: {e}")),
                );
            }
        }
    }

    async fn update_user(
        &self,
        existing: &SiteUser,
        role: SiteRole,
        auth: sitesync_core::AuthMode,
        note: Option<String>,
        snapshot: &mut SiteSnapshot,
        report: &mut RunReport,
    ) {
        match self.site.update_user(existing.id, role, auth).await {
            Ok(updated) => {
                let mut event =
                    ReportEvent::new(ReportArea::User, &existing.name, ChangeKind::Modified)
                        .with_before(describe(existing.role, existing.auth))
                        .with_after(describe(updated.role, updated.auth));
                if let Some(note) = note {
                    event = event.with_note(note);
                }
                report.push(event);
                snapshot.put_user(updated);
            }
            Err(e) => {
                report.push(
                    ReportEvent::new(ReportArea::User, &existing.name, ChangeKind::Error)
                        .with_note(format!("update failed: {e}")),
                );
            }
        }
    }

    async fn unlicense(
        &self,
        user: &SiteUser,
        note: Option<String>,
        snapshot: &mut SiteSnapshot,
        report: &mut RunReport,
    ) {
        // Role drops to unlicensed; auth stays as it was.
        match self
            .site
            .update_user(user.id, SiteRole::Unlicensed, user.auth)
            .await
        {
            Ok(updated) => {
                let mut event =
                    ReportEvent::new(ReportArea::User, &user.name, ChangeKind::Unlicensed)
                        .with_before(describe(user.role, user.auth))
                        .with_after(describe(updated.role, updated.auth));
                if let Some(note) = note {
                    event = event.with_note(note);
                }
                report.push(event);
                snapshot.put_user(updated);
            }
            Err(e) => {
                report.push(
                    ReportEvent::new(ReportArea::User, &user.name, ChangeKind::Error)
                        .with_note(format!("unlicense failed: {e}")),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitesync_connector::memory::MemorySite;
    use sitesync_connector::ContentType;
    use sitesync_core::AuthMode;

    use crate::config::AuthPolicy;

    fn desired_with(principal: Principal) -> RoleBuckets {
        let mut buckets = RoleBuckets::new();
        buckets.add(principal);
        buckets
    }

    async fn run_pass(
        site: &MemorySite,
        policy: PolicyMatrix,
        desired: &RoleBuckets,
    ) -> RunReport {
        let mut snapshot = SiteSnapshot::load(site).await.unwrap();
        let mut report = RunReport::new();
        UserReconciler::new(site, &policy)
            .reconcile(desired, &mut snapshot, &mut report)
            .await;
        report
    }

    #[tokio::test]
    async fn test_missing_user_added() {
        let site = MemorySite::new();
        let desired = desired_with(Principal::new(
            "a@x.com",
            SiteRole::Explorer,
            AuthMode::Default,
        ));
        let policy = PolicyMatrix::uniform(AuthPolicy::enforce(UnexpectedAction::Report));

        let report = run_pass(&site, policy, &desired).await;

        assert_eq!(report.statistics.count(ReportArea::User, ChangeKind::Added), 1);
        let users = site.users().await;
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].role, SiteRole::Explorer);
        assert_eq!(users[0].auth, AuthMode::Default);
    }

    #[tokio::test]
    async fn test_missing_user_report_only() {
        let site = MemorySite::new();
        let desired = desired_with(Principal::new(
            "a@x.com",
            SiteRole::Explorer,
            AuthMode::Default,
        ));
        let policy = PolicyMatrix::uniform(AuthPolicy::report_only());

        let report = run_pass(&site, policy, &desired).await;

        assert_eq!(
            report.statistics.count(ReportArea::User, ChangeKind::Reported),
            1
        );
        assert!(site.users().await.is_empty());
    }

    #[tokio::test]
    async fn test_auth_mismatch_always_modified() {
        let site = MemorySite::new();
        site.seed_user("a@x.com", SiteRole::Creator, AuthMode::Default)
            .await;
        // Promotion allowed and the site rank is higher, but the auth is
        // wrong; the auth is fixed while the promoted role stands.
        let desired = desired_with(
            Principal::new("a@x.com", SiteRole::Explorer, AuthMode::Saml)
                .with_promoted_role_allowed(true),
        );
        let policy = PolicyMatrix::uniform(AuthPolicy::report_only());

        let report = run_pass(&site, policy, &desired).await;

        assert_eq!(
            report.statistics.count(ReportArea::User, ChangeKind::Modified),
            1
        );
        let users = site.users().await;
        assert_eq!(users[0].auth, AuthMode::Saml);
        assert_eq!(users[0].role, SiteRole::Creator);
    }

    #[tokio::test]
    async fn test_promoted_role_tolerated_only_when_allowed() {
        for (allowed, expected_modifies) in [(true, 0), (false, 1)] {
            let site = MemorySite::new();
            site.seed_user("a@x.com", SiteRole::Creator, AuthMode::Default)
                .await;
            let desired = desired_with(
                Principal::new("a@x.com", SiteRole::Explorer, AuthMode::Default)
                    .with_promoted_role_allowed(allowed),
            );
            let policy = PolicyMatrix::uniform(AuthPolicy::enforce(UnexpectedAction::Report));

            let report = run_pass(&site, policy, &desired).await;

            assert_eq!(
                report.statistics.count(ReportArea::User, ChangeKind::Modified),
                expected_modifies,
                "allow_promoted_role={allowed}"
            );
        }
    }

    #[tokio::test]
    async fn test_unexpected_user_unlicensed_auth_unchanged() {
        let site = MemorySite::new();
        site.seed_user("b@x.com", SiteRole::Viewer, AuthMode::Saml)
            .await;
        let desired = RoleBuckets::new();
        let policy = PolicyMatrix::uniform(AuthPolicy {
            unexpected: UnexpectedAction::Unlicense,
            ..AuthPolicy::report_only()
        });

        let report = run_pass(&site, policy, &desired).await;

        assert_eq!(
            report.statistics.count(ReportArea::User, ChangeKind::Unlicensed),
            1
        );
        let users = site.users().await;
        assert_eq!(users[0].role, SiteRole::Unlicensed);
        assert_eq!(users[0].auth, AuthMode::Saml);
    }

    #[tokio::test]
    async fn test_delete_falls_back_to_unlicense_for_content_owner() {
        let site = MemorySite::new();
        let owner = site
            .seed_user("owner@x.com", SiteRole::Creator, AuthMode::Default)
            .await;
        site.seed_content(ContentType::Workbook, "Quarterly", owner)
            .await;
        let desired = RoleBuckets::new();
        let policy = PolicyMatrix::uniform(AuthPolicy {
            unexpected: UnexpectedAction::Delete,
            ..AuthPolicy::report_only()
        });

        let report = run_pass(&site, policy, &desired).await;

        assert_eq!(
            report.statistics.count(ReportArea::User, ChangeKind::Unlicensed),
            1
        );
        let users = site.users().await;
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].role, SiteRole::Unlicensed);
    }

    #[tokio::test]
    async fn test_unexpected_delete_removes_user() {
        let site = MemorySite::new();
        site.seed_user("d@x.com", SiteRole::Viewer, AuthMode::Default)
            .await;
        let desired = RoleBuckets::new();
        let policy = PolicyMatrix::uniform(AuthPolicy {
            unexpected: UnexpectedAction::Delete,
            ..AuthPolicy::report_only()
        });

        let report = run_pass(&site, policy, &desired).await;

        assert_eq!(
            report.statistics.count(ReportArea::User, ChangeKind::Removed),
            1
        );
        assert!(site.users().await.is_empty());
    }

    #[tokio::test]
    async fn test_in_sync_user_untouched() {
        let site = MemorySite::new();
        site.seed_user("a@x.com", SiteRole::Explorer, AuthMode::Default)
            .await;
        let desired = desired_with(Principal::new(
            "a@x.com",
            SiteRole::Explorer,
            AuthMode::Default,
        ));
        let policy = PolicyMatrix::uniform(AuthPolicy::enforce(UnexpectedAction::Delete));

        let report = run_pass(&site, policy, &desired).await;

        assert!(report.events.is_empty());
        assert_eq!(report.statistics.in_sync, 1);
        assert_eq!(site.users().await.len(), 1);
    }
}
