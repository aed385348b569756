//! sitesync Core Library
//!
//! Shared value types for sitesync.
//!
//! # Modules
//!
//! - [`roles`] - Site role ranking and promotion rules
//! - [`principal`] - User principals and authentication modes
//! - [`error`] - Standardized error types (`CoreError`)
//!
//! # Example
//!
//! ```
//! use sitesync_core::{AuthMode, Principal, SiteRole};
//!
//! let principal = Principal::new("a@example.com", SiteRole::Explorer, AuthMode::Default)
//!     .with_source_group("Analytics Users");
//!
//! assert_eq!(principal.name_key(), "a@example.com");
//! assert!(SiteRole::Creator.rank() > SiteRole::Explorer.rank());
//! ```

pub mod error;
pub mod principal;
pub mod roles;

// Re-export main types for convenient access
pub use error::{CoreError, CoreResult};
pub use principal::{name_key, AuthMode, Principal};
pub use roles::{is_combined_creator_administrator, SiteRole};
