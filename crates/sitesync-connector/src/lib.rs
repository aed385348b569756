//! sitesync Connector Contracts
//!
//! Trait definitions and wire types for the two external collaborators the
//! reconciliation engine consumes:
//!
//! - [`traits::DirectoryClient`] - paginated group/member lookup against an
//!   external identity provider (Entra ID, LDAP, file manifest)
//! - [`traits::SiteClient`] - CRUD for users, groups, memberships and
//!   content ownership on the target analytics site
//!
//! Both are black boxes from the engine's perspective: every call returns a
//! structured [`error::ConnectorResult`], and expected conditions such as a
//! duplicate create or a delete refused because the user owns content
//! surface as typed errors, never panics.
//!
//! The [`memory`] module provides in-memory implementations of both
//! contracts, used by the engine's tests and usable as a dry-run target.

pub mod error;
pub mod memory;
pub mod traits;
pub mod types;

// Re-export main types
pub use error::{ConnectorError, ConnectorResult};
pub use traits::{DirectoryClient, SiteClient};
pub use types::{
    ContentRef, ContentType, DirectoryMember, DirectoryUser, GrantLicenseMode, GroupRef,
    MatchMode, MemberPage, PageToken, SiteGroup, SiteUser,
};
