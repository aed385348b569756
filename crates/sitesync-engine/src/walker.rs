//! Recursive directory traversal.
//!
//! Walks nested group memberships from the identity provider. Pagination
//! within one group is strictly sequential (each page request depends on
//! the previous page's continuation token); sibling subgroups are walked
//! as concurrently spawned tasks whose results are merged in spawn order,
//! so nothing mutates shared state from a branch.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use sitesync_connector::{DirectoryClient, DirectoryMember, DirectoryUser, GroupRef};

use crate::error::{EngineError, EngineResult};

/// Walks nested group memberships with a defensive depth bound.
#[derive(Clone)]
pub struct DirectoryWalker {
    directory: Arc<dyn DirectoryClient>,
    max_depth: usize,
}

impl DirectoryWalker {
    /// Create a walker over the given directory.
    pub fn new(directory: Arc<dyn DirectoryClient>, max_depth: usize) -> Self {
        Self {
            directory,
            max_depth,
        }
    }

    /// Enumerate every user reachable from `root`, descending into nested
    /// groups.
    ///
    /// Re-visiting the exact same group id is a no-op, which keeps the
    /// walk safe against malformed directories that are not a DAG. The
    /// result may contain duplicate users discovered through different
    /// paths; the caller's aggregate de-duplicates them.
    #[instrument(skip(self), fields(group = %root.name))]
    pub async fn collect_users(&self, root: GroupRef) -> EngineResult<Vec<DirectoryUser>> {
        let visited = Arc::new(Mutex::new(HashSet::new()));
        walk(self.directory.clone(), root, 0, self.max_depth, visited).await
    }
}

/// One branch of the walk. Returns an owned, branch-local result.
fn walk(
    directory: Arc<dyn DirectoryClient>,
    group: GroupRef,
    depth: usize,
    max_depth: usize,
    visited: Arc<Mutex<HashSet<String>>>,
) -> Pin<Box<dyn Future<Output = EngineResult<Vec<DirectoryUser>>> + Send>> {
    Box::pin(async move {
        if depth >= max_depth {
            warn!(
                group = %group.name,
                depth,
                "recursion depth bound reached, not descending"
            );
            return Ok(Vec::new());
        }

        {
            let mut seen = visited.lock().await;
            if !seen.insert(group.id.clone()) {
                debug!(group = %group.name, "group already visited, skipping");
                return Ok(Vec::new());
            }
        }

        let mut users = Vec::new();
        let mut subgroups = Vec::new();

        // Sequential pagination: each token comes from the previous page.
        let mut page_token = None;
        loop {
            let page = directory.list_members(&group, page_token).await?;
            for member in page.members {
                match member {
                    DirectoryMember::User(user) => users.push(user),
                    DirectoryMember::Group(subgroup) => subgroups.push(subgroup),
                }
            }
            match page.next {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(
            group = %group.name,
            users = users.len(),
            subgroups = subgroups.len(),
            "enumerated group page set"
        );

        // Sibling subgroups run concurrently; each returns its own local
        // result and the merge happens here, in spawn order.
        let handles: Vec<_> = subgroups
            .into_iter()
            .map(|subgroup| {
                let directory = directory.clone();
                let visited = visited.clone();
                tokio::spawn(walk(directory, subgroup, depth + 1, max_depth, visited))
            })
            .collect();

        for handle in handles {
            let branch = handle
                .await
                .map_err(|e| EngineError::invariant(format!("traversal task panicked: {e}")))??;
            users.extend(branch);
        }

        Ok(users)
    })
}
