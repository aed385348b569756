//! Reconciliation executors.
//!
//! The diff/apply passes for the three reconciliation domains. Each pass
//! compares the desired state against the site snapshot, applies idempotent
//! corrective operations through the site client per the policy matrix, and
//! mutates the snapshot in place as operations succeed.
//!
//! Execution is single-threaded per run and deterministic: the explicit
//! desired list is processed first (sorted by name key), then the
//! unexpected list, because later decisions depend on earlier ones only
//! through the snapshot.

pub mod groups;
pub mod users;

pub use groups::GroupReconciler;
pub use users::UserReconciler;
