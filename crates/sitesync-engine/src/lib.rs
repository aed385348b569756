//! # sitesync Reconciliation Engine
//!
//! Converges the membership and access-level state of a multi-tenant
//! analytics site to a desired state expressed by directory groups and
//! explicit overrides.
//!
//! ## Overview
//!
//! The engine provides:
//! - Desired-state aggregation: recursive, paginated directory traversal
//!   collapsed into conflict-resolved role and group buckets
//! - Diff/apply execution across three domains (user/role, group,
//!   group-membership) behind a configurable policy matrix
//! - Ownership remapping for workbooks, datasources and flows
//! - An append-only run report with per-decision events and statistics
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          SyncEngine                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌────────────┐    ┌─────────────┐    ┌──────────────────┐     │
//! │  │ SyncConfig │───►│ Aggregator  │───►│   Reconcilers    │     │
//! │  │ (+ policy) │    │ (walker +   │    │ (users, groups)  │     │
//! │  └────────────┘    │  buckets)   │    └────────┬─────────┘     │
//! │                    └──────┬──────┘             │               │
//! │                           │                    ▼               │
//! │                    ┌──────▼──────┐    ┌──────────────────┐     │
//! │                    │ Directory   │    │  SiteSnapshot    │     │
//! │                    │ Client      │    │  + SiteClient    │     │
//! │                    └─────────────┘    └────────┬─────────┘     │
//! │                                                ▼               │
//! │                                       ┌──────────────────┐     │
//! │                                       │    RunReport     │     │
//! │                                       └──────────────────┘     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use sitesync_engine::{SyncConfig, SyncEngine};
//!
//! let engine = SyncEngine::new(directory, site);
//! let outcome = engine.run(&config).await?;
//!
//! for row in outcome.report.to_rows() {
//!     println!("{}", row.join(","));
//! }
//! ```

pub mod aggregator;
pub mod buckets;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod ownership;
pub mod report;
pub mod snapshot;
pub mod walker;

// Re-export main types
pub use aggregator::{Aggregator, DesiredState};
pub use buckets::{AddOutcome, GroupBucket, GroupBuckets, RoleBucket, RoleBuckets};
pub use config::{
    AuthPolicy, ExistingAction, GroupLicense, GroupRule, MissingAction, PolicyMatrix, RoleRule,
    SyncConfig, UnexpectedAction,
};
pub use engine::{RunOutcome, SyncEngine};
pub use error::{ConfigError, EngineError, EngineResult};
pub use ownership::OwnershipRemapper;
pub use report::{ChangeKind, ReportArea, ReportEvent, RunReport, RunStatistics};
pub use snapshot::SiteSnapshot;
pub use walker::DirectoryWalker;
