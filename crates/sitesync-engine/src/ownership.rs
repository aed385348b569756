//! Content ownership remapping.
//!
//! A secondary diff/apply pass that reassigns content ownership from one
//! principal to another across every content type. Per-item failures are
//! logged and the batch continues.

use tracing::{info, instrument, warn};

use sitesync_connector::{ContentType, SiteClient};
use sitesync_core::name_key;

use crate::report::{ChangeKind, ReportArea, ReportEvent, RunReport};

/// Reassigns content ownership between site users.
pub struct OwnershipRemapper<'a> {
    site: &'a dyn SiteClient,
}

impl<'a> OwnershipRemapper<'a> {
    /// Create a remapper over the given site client.
    pub fn new(site: &'a dyn SiteClient) -> Self {
        Self { site }
    }

    /// Remap ownership for each `(old_owner, new_owner)` name pair.
    ///
    /// Both names must resolve to site users; a pair that does not resolve
    /// is a per-pair error and the batch continues.
    #[instrument(skip(self, pairs, report))]
    pub async fn remap(&self, pairs: &[(String, String)], report: &mut RunReport) {
        let users = match self.site.list_users().await {
            Ok(users) => users,
            Err(e) => {
                report.push(
                    ReportEvent::new(ReportArea::Ownership, "*", ChangeKind::Error)
                        .with_note(format!("listing site users failed: {e}")),
                );
                return;
            }
        };

        for (old_owner, new_owner) in pairs {
            let old = users.iter().find(|u| u.name_key() == name_key(old_owner));
            let new = users.iter().find(|u| u.name_key() == name_key(new_owner));

            let (old, new) = match (old, new) {
                (Some(old), Some(new)) => (old, new),
                _ => {
                    report.push(
                        ReportEvent::new(ReportArea::Ownership, old_owner, ChangeKind::Error)
                            .with_note(format!(
                                "cannot remap to '{new_owner}': one or both users not on site"
                            )),
                    );
                    continue;
                }
            };

            for content_type in ContentType::all() {
                let items = match self.site.list_content(*content_type).await {
                    Ok(items) => items,
                    Err(e) => {
                        report.push(
                            ReportEvent::new(ReportArea::Ownership, old_owner, ChangeKind::Error)
                                .with_note(format!("listing {content_type} content failed: {e}")),
                        );
                        continue;
                    }
                };

                let owned: Vec<_> = items.into_iter().filter(|c| c.owner_id == old.id).collect();
                info!(
                    old_owner = %old.name,
                    new_owner = %new.name,
                    content_type = %content_type,
                    items = owned.len(),
                    "remapping content ownership"
                );

                for item in owned {
                    match self.site.update_content_owner(&item, new.id).await {
                        Ok(()) => {
                            report.push(
                                ReportEvent::new(
                                    ReportArea::Ownership,
                                    &item.name,
                                    ChangeKind::Modified,
                                )
                                .with_before(old.name.clone())
                                .with_after(new.name.clone())
                                .with_note(content_type.to_string()),
                            );
                        }
                        Err(e) => {
                            warn!(item = %item.name, error = %e, "ownership update failed");
                            report.push(
                                ReportEvent::new(
                                    ReportArea::Ownership,
                                    &item.name,
                                    ChangeKind::Error,
                                )
                                .with_note(format!("reassign failed: {e}")),
                            );
                        }
                    }
                }
            }
        }
    }
}
