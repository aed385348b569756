//! End-to-end reconciliation scenarios against in-memory collaborators.

use std::sync::Arc;

use sitesync_connector::memory::{MemoryDirectory, MemorySite};
use sitesync_connector::types::{DirectoryMember, DirectoryUser};
use sitesync_connector::DirectoryClient;
use sitesync_core::{AuthMode, Principal, SiteRole};
use sitesync_engine::{
    AuthPolicy, ChangeKind, GroupRule, PolicyMatrix, ReportArea, RoleRule, SyncConfig, SyncEngine,
    UnexpectedAction,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn user(id: &str, name: &str) -> DirectoryMember {
    DirectoryMember::User(DirectoryUser::new(id, name))
}

fn enforcing(unexpected: UnexpectedAction) -> PolicyMatrix {
    PolicyMatrix::uniform(AuthPolicy::enforce(unexpected))
}

#[tokio::test]
async fn empty_site_converges_to_desired_state() {
    init_tracing();
    let directory = MemoryDirectory::new().with_group("Analysts", vec![user("u1", "a@x.com")]);
    let site = Arc::new(MemorySite::new());
    let engine = SyncEngine::new(Arc::new(directory), site.clone());

    let mut config = SyncConfig::new();
    config
        .role_rules
        .push(RoleRule::new("Analysts", SiteRole::Explorer, AuthMode::Default));
    config.policies = enforcing(UnexpectedAction::Report);

    let outcome = engine.run(&config).await.unwrap();

    assert_eq!(
        outcome
            .report
            .statistics
            .count(ReportArea::User, ChangeKind::Added),
        1
    );
    let users = site.users().await;
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].name, "a@x.com");
    assert_eq!(users[0].role, SiteRole::Explorer);
    assert_eq!(users[0].auth, AuthMode::Default);
}

#[tokio::test]
async fn unexpected_user_is_unlicensed_with_auth_unchanged() {
    init_tracing();
    let directory = MemoryDirectory::new();
    let site = Arc::new(MemorySite::new());
    site.seed_user("b@x.com", SiteRole::Viewer, AuthMode::Saml)
        .await;
    let engine = SyncEngine::new(Arc::new(directory), site.clone());

    let mut config = SyncConfig::new();
    config.policies = enforcing(UnexpectedAction::Unlicense);

    let outcome = engine.run(&config).await.unwrap();

    assert_eq!(
        outcome
            .report
            .statistics
            .count(ReportArea::User, ChangeKind::Unlicensed),
        1
    );
    let users = site.users().await;
    assert_eq!(users[0].role, SiteRole::Unlicensed);
    assert_eq!(users[0].auth, AuthMode::Saml);
}

#[tokio::test]
async fn rerun_is_idempotent() {
    init_tracing();
    let directory = Arc::new(
        MemoryDirectory::new().with_group(
            "Analysts",
            vec![user("u1", "a@x.com"), user("u2", "b@x.com")],
        ),
    );
    let site = Arc::new(MemorySite::new());
    let engine = SyncEngine::new(directory, site.clone());

    let mut config = SyncConfig::new();
    config
        .role_rules
        .push(RoleRule::new("Analysts", SiteRole::Explorer, AuthMode::Default));
    config.group_rules.push(GroupRule::new("Analysts"));
    config.policies = enforcing(UnexpectedAction::Delete);

    let first = engine.run(&config).await.unwrap();
    assert!(first.report.statistics.errors == 0);
    assert_eq!(site.users().await.len(), 2);
    assert_eq!(site.groups().await.len(), 1);

    let second = engine.run(&config).await.unwrap();
    assert!(second.report.events.is_empty());
    assert_eq!(second.report.statistics.in_sync, 2);
    assert_eq!(site.users().await.len(), 2);
}

#[tokio::test]
async fn nested_groups_and_duplicates_collapse_to_one_principal() {
    init_tracing();
    // "a@x.com" appears directly in Parents and again in a nested group
    // targeted by a lower-ranked rule; the higher rank wins.
    let directory = MemoryDirectory::new()
        .with_group("Nested", vec![user("u1", "a@x.com")]);
    let nested = directory
        .resolve_groups("Nested", sitesync_connector::MatchMode::Equals)
        .await
        .unwrap()
        .remove(0);
    let directory = directory.with_group(
        "Parents",
        vec![user("u1", "a@x.com"), DirectoryMember::Group(nested)],
    );

    let site = Arc::new(MemorySite::new());
    let engine = SyncEngine::new(Arc::new(directory), site.clone());

    let mut config = SyncConfig::new();
    config
        .role_rules
        .push(RoleRule::new("Nested", SiteRole::Viewer, AuthMode::Default));
    config
        .role_rules
        .push(RoleRule::new("Parents", SiteRole::Creator, AuthMode::Default));
    config.policies = enforcing(UnexpectedAction::Report);

    engine.run(&config).await.unwrap();

    let users = site.users().await;
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].role, SiteRole::Creator);
}

#[tokio::test]
async fn combined_creator_administrator_applied_on_site() {
    init_tracing();
    let directory = MemoryDirectory::new()
        .with_group("Creators", vec![user("u1", "a@x.com")])
        .with_group("Site Admins", vec![user("u1", "a@x.com")]);
    let site = Arc::new(MemorySite::new());
    let engine = SyncEngine::new(Arc::new(directory), site.clone());

    let mut config = SyncConfig::new();
    config
        .role_rules
        .push(RoleRule::new("Creators", SiteRole::Creator, AuthMode::Default));
    config.role_rules.push(RoleRule::new(
        "Site Admins",
        SiteRole::SiteAdministratorExplorer,
        AuthMode::Default,
    ));
    config.policies = enforcing(UnexpectedAction::Report);

    engine.run(&config).await.unwrap();

    let users = site.users().await;
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].role, SiteRole::SiteAdministratorCreator);
}

#[tokio::test]
async fn group_sync_converges_membership_and_seeds_empty_groups() {
    init_tracing();
    let directory = MemoryDirectory::new()
        .with_group("Team", vec![user("u1", "a@x.com")])
        .with_group("Empty", vec![]);
    let site = Arc::new(MemorySite::new());
    site.seed_user("a@x.com", SiteRole::Explorer, AuthMode::Default)
        .await;
    site.seed_user("d@x.com", SiteRole::Explorer, AuthMode::Default)
        .await;
    site.seed_group("Team", vec!["d@x.com".into()]).await;
    let engine = SyncEngine::new(Arc::new(directory), site.clone());

    let mut config = SyncConfig::new();
    config.group_rules.push(GroupRule::new("Team"));
    config.group_rules.push(GroupRule::new("Empty"));
    // Overrides keep both site users; only membership should change.
    config.policies = enforcing(UnexpectedAction::Delete);
    config.overrides.push(Principal::new(
        "d@x.com",
        SiteRole::Explorer,
        AuthMode::Default,
    ));
    config.overrides.push(Principal::new(
        "a@x.com",
        SiteRole::Explorer,
        AuthMode::Default,
    ));

    let outcome = engine.run(&config).await.unwrap();

    assert_eq!(outcome.report.statistics.errors, 0);
    let groups = site.groups().await;
    assert_eq!(groups.len(), 2);
    let team = groups.iter().find(|g| g.name == "Team").unwrap();
    assert_eq!(team.members.as_ref().unwrap(), &vec!["a@x.com".to_string()]);
    let empty = groups.iter().find(|g| g.name == "Empty").unwrap();
    assert!(empty.members.as_ref().unwrap().is_empty());
}

#[tokio::test]
async fn pattern_rules_tolerate_zero_matches() {
    init_tracing();
    let directory = MemoryDirectory::new();
    let site = Arc::new(MemorySite::new());
    let engine = SyncEngine::new(Arc::new(directory), site.clone());

    let mut config = SyncConfig::new();
    config.role_rules.push(
        RoleRule::new("Sales", SiteRole::Viewer, AuthMode::Default).with_prefix_match(),
    );
    config
        .group_rules
        .push(GroupRule::new("Sales").with_prefix_match());
    config.policies = enforcing(UnexpectedAction::Report);

    let outcome = engine.run(&config).await.unwrap();

    assert_eq!(
        outcome
            .report
            .statistics
            .count(ReportArea::Config, ChangeKind::Reported),
        2
    );
    assert_eq!(outcome.report.statistics.errors, 0);
    assert!(site.users().await.is_empty());
    assert!(site.groups().await.is_empty());
}

#[tokio::test]
async fn overrides_are_authoritative_over_directory_rank() {
    init_tracing();
    let directory =
        MemoryDirectory::new().with_group("Admins", vec![user("u1", "a@x.com")]);
    let site = Arc::new(MemorySite::new());
    let engine = SyncEngine::new(Arc::new(directory), site.clone());

    let mut config = SyncConfig::new();
    config.role_rules.push(RoleRule::new(
        "Admins",
        SiteRole::ServerAdministrator,
        AuthMode::Default,
    ));
    config
        .overrides
        .push(Principal::new("a@x.com", SiteRole::Viewer, AuthMode::Default));
    config.policies = enforcing(UnexpectedAction::Report);

    engine.run(&config).await.unwrap();

    let users = site.users().await;
    assert_eq!(users[0].role, SiteRole::Viewer);
}

#[tokio::test]
async fn run_continues_past_per_member_errors() {
    init_tracing();
    // "ghost@x.com" is desired in a group but is not a site user and no
    // role rule creates it; the member add fails, the rest proceeds.
    let directory = MemoryDirectory::new().with_group(
        "Team",
        vec![user("u1", "real@x.com"), user("u2", "ghost@x.com")],
    );
    let site = Arc::new(MemorySite::new());
    site.seed_user("real@x.com", SiteRole::Explorer, AuthMode::Default)
        .await;
    let engine = SyncEngine::new(Arc::new(directory), site.clone());

    let mut config = SyncConfig::new();
    config.group_rules.push(GroupRule::new("Team"));
    config.policies = enforcing(UnexpectedAction::Report);

    let outcome = engine.run(&config).await.unwrap();

    assert_eq!(outcome.report.statistics.errors, 1);
    let groups = site.groups().await;
    assert_eq!(
        groups[0].members.as_ref().unwrap(),
        &vec!["real@x.com".to_string()]
    );
}

#[tokio::test]
async fn deleted_user_leaves_no_stale_membership_errors() {
    init_tracing();
    // "gone@x.com" is unexpected and a member of "Team"; deleting the
    // user must not leave the group pass tripping over the stale member.
    let directory = MemoryDirectory::new().with_group("Team", vec![user("u1", "keep@x.com")]);
    let site = Arc::new(MemorySite::new());
    site.seed_user("keep@x.com", SiteRole::Explorer, AuthMode::Default)
        .await;
    site.seed_user("gone@x.com", SiteRole::Viewer, AuthMode::Default)
        .await;
    site.seed_group("Team", vec!["keep@x.com".into(), "gone@x.com".into()])
        .await;
    let engine = SyncEngine::new(Arc::new(directory), site.clone());

    let mut config = SyncConfig::new();
    config
        .role_rules
        .push(RoleRule::new("Team", SiteRole::Explorer, AuthMode::Default));
    config.group_rules.push(GroupRule::new("Team"));
    config.policies = enforcing(UnexpectedAction::Delete);

    let outcome = engine.run(&config).await.unwrap();

    assert_eq!(outcome.report.statistics.errors, 0);
    assert_eq!(
        outcome
            .report
            .statistics
            .count(ReportArea::User, ChangeKind::Removed),
        1
    );
    assert_eq!(
        outcome
            .report
            .statistics
            .count(ReportArea::Membership, ChangeKind::Removed),
        0
    );
    let users = site.users().await;
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].name, "keep@x.com");
    assert_eq!(
        site.groups().await[0].members.as_ref().unwrap(),
        &vec!["keep@x.com".to_string()]
    );
}

#[tokio::test]
async fn ownership_remap_is_independent_of_runs() {
    init_tracing();
    let directory = MemoryDirectory::new();
    let site = Arc::new(MemorySite::new());
    let old = site
        .seed_user("old@x.com", SiteRole::Creator, AuthMode::Default)
        .await;
    let new = site
        .seed_user("new@x.com", SiteRole::Creator, AuthMode::Default)
        .await;
    site.seed_content(
        sitesync_connector::ContentType::Workbook,
        "Quarterly",
        old,
    )
    .await;

    let engine = SyncEngine::new(Arc::new(directory), site.clone());
    let report = engine
        .remap_ownership(&[("old@x.com".into(), "new@x.com".into())])
        .await;

    assert_eq!(
        report
            .statistics
            .count(ReportArea::Ownership, ChangeKind::Modified),
        1
    );
    assert_eq!(site.content().await[0].owner_id, new);
}
