//! Group and group-membership reconciliation.
//!
//! For each configured target group: fetch or create the group (creation
//! applies the license-grant instruction), then converge its member set by
//! symmetric difference against the desired members.

use std::collections::BTreeSet;

use tracing::{instrument, warn};

use sitesync_connector::{SiteClient, SiteGroup};
use sitesync_core::name_key;

use crate::buckets::{GroupBucket, GroupBuckets};
use crate::config::{MissingAction, PolicyMatrix, UnexpectedAction};
use crate::report::{ChangeKind, ReportArea, ReportEvent, RunReport};
use crate::snapshot::SiteSnapshot;

/// Diff/apply pass for the group and group-membership domains.
pub struct GroupReconciler<'a> {
    site: &'a dyn SiteClient,
    policy: &'a PolicyMatrix,
}

impl<'a> GroupReconciler<'a> {
    /// Create a reconciler over the given site client and policy.
    pub fn new(site: &'a dyn SiteClient, policy: &'a PolicyMatrix) -> Self {
        Self { site, policy }
    }

    /// Run the full group pass in deterministic (name-key) order.
    #[instrument(skip_all)]
    pub async fn reconcile(
        &self,
        desired: &GroupBuckets,
        snapshot: &mut SiteSnapshot,
        report: &mut RunReport,
    ) {
        for bucket in desired.buckets() {
            self.reconcile_group(bucket, snapshot, report).await;
        }
    }

    async fn reconcile_group(
        &self,
        bucket: &GroupBucket,
        snapshot: &mut SiteSnapshot,
        report: &mut RunReport,
    ) {
        let group = match snapshot.group(&bucket.name).cloned() {
            Some(group) => group,
            None if self.policy.group_policy().missing == MissingAction::Report => {
                report.push(
                    ReportEvent::new(ReportArea::Group, &bucket.name, ChangeKind::Reported)
                        .with_note("missing from site"),
                );
                return;
            }
            None => match self.create_group(bucket, report).await {
                Some(group) => {
                    snapshot.put_group(group.clone());
                    group
                }
                None => return,
            },
        };

        let current: BTreeSet<String> = group
            .members
            .clone()
            .unwrap_or_default()
            .into_iter()
            .map(|m| name_key(&m))
            .collect();

        let desired_keys: BTreeSet<String> = bucket.members.keys().cloned().collect();

        let mut members_after = group.members.clone().unwrap_or_default();

        // Desired but absent.
        for key in desired_keys.difference(&current) {
            let member_name = &bucket.members[key];
            self.add_member(&group, member_name, &mut members_after, snapshot, report)
                .await;
        }

        // Present but undesired.
        for key in current.difference(&desired_keys) {
            self.remove_member(&group, key, &mut members_after, snapshot, report)
                .await;
        }

        let mut updated = group;
        updated.members = Some(members_after);
        snapshot.put_group(updated);
    }

    async fn create_group(
        &self,
        bucket: &GroupBucket,
        report: &mut RunReport,
    ) -> Option<SiteGroup> {
        match self
            .site
            .create_group(&bucket.name, bucket.license.mode, bucket.license.minimum_role)
            .await
        {
            Ok(group) => {
                report.push(
                    ReportEvent::new(ReportArea::Group, &bucket.name, ChangeKind::Added)
                        .with_after(format!("grant_license={}", bucket.license.mode)),
                );
                Some(group)
            }
            Err(e) => {
                report.push(
                    ReportEvent::new(ReportArea::Group, &bucket.name, ChangeKind::Error)
                        .with_note(format!("create failed: {e}")),
                );
                None
            }
        }
    }

    async fn add_member(
        &self,
        group: &SiteGroup,
        member_name: &str,
        members_after: &mut Vec<String>,
        snapshot: &SiteSnapshot,
        report: &mut RunReport,
    ) {
        // A member that is not a site user cannot be added to a group it
        // cannot belong to. Hard per-member error, not fatal to the run.
        let Some(user) = snapshot.user(member_name) else {
            report.push(
                ReportEvent::new(ReportArea::Membership, member_name, ChangeKind::Error)
                    .with_note(format!("not a site user, cannot join '{}'", group.name)),
            );
            return;
        };

        match self.policy.policy_for(user.auth).missing {
            MissingAction::Add => match self.site.add_member(group.id, user.id).await {
                Ok(()) => {
                    members_after.push(user.name.clone());
                    report.push(
                        ReportEvent::new(ReportArea::Membership, member_name, ChangeKind::Added)
                            .with_note(format!("joined '{}'", group.name)),
                    );
                }
                Err(e) => {
                    report.push(
                        ReportEvent::new(ReportArea::Membership, member_name, ChangeKind::Error)
                            .with_note(format!("add to '{}' failed: {e}", group.name)),
                    );
                }
            },
            MissingAction::Report => {
                report.push(
                    ReportEvent::new(ReportArea::Membership, member_name, ChangeKind::Reported)
                        .with_note(format!("missing from '{}'", group.name)),
                );
            }
        }
    }

    async fn remove_member(
        &self,
        group: &SiteGroup,
        member_key: &str,
        members_after: &mut Vec<String>,
        snapshot: &SiteSnapshot,
        report: &mut RunReport,
    ) {
        let Some(user) = snapshot.user(member_key) else {
            // Believed present in the group, missing from the user list.
            warn!(member = %member_key, group = %group.name, "member has no user record, skipping");
            report.push(
                ReportEvent::new(ReportArea::Membership, member_key, ChangeKind::Error)
                    .with_note(format!(
                        "listed in '{}' but missing from site user list",
                        group.name
                    )),
            );
            return;
        };

        match self.policy.policy_for(user.auth).unexpected {
            UnexpectedAction::Delete => match self.site.remove_member(group.id, user.id).await {
                Ok(()) => {
                    members_after.retain(|m| name_key(m) != member_key);
                    report.push(
                        ReportEvent::new(ReportArea::Membership, &user.name, ChangeKind::Removed)
                            .with_note(format!("left '{}'", group.name)),
                    );
                }
                Err(e) => {
                    report.push(
                        ReportEvent::new(ReportArea::Membership, &user.name, ChangeKind::Error)
                            .with_note(format!("remove from '{}' failed: {e}", group.name)),
                    );
                }
            },
            UnexpectedAction::Report | UnexpectedAction::Unlicense => {
                report.push(
                    ReportEvent::new(ReportArea::Membership, &user.name, ChangeKind::Reported)
                        .with_note(format!("undesired member of '{}'", group.name)),
                );
            }
        }
    }
}
