//! Integration tests for fork branch synchronization against MockHost.

use std::sync::Arc;

use pluginsync::core::config::Config;
use pluginsync::core::document;
use pluginsync::core::types::{Oid, RefName};
use pluginsync::host::mock::{FailOn, MockHost, MockOperation};
use pluginsync::host::{HostError, Repository};
use pluginsync::repo::sync::SyncState;
use pluginsync::repo::{RepoContext, RepoError};

const UPSTREAM: &str = "intelsdi-x/snap-plugin-collector-cpu";
const FORK: &str = "me/snap-plugin-collector-cpu";

fn sha(c: char) -> String {
    c.to_string().repeat(40)
}

fn oid(c: char) -> Oid {
    Oid::new(sha(c)).unwrap()
}

fn master() -> RefName {
    RefName::new("refs/heads/master").unwrap()
}

/// Upstream at `a`, fork registered as its child with no refs.
fn fleet() -> MockHost {
    let host = MockHost::new()
        .with_repository(Repository::new(UPSTREAM))
        .with_repository(Repository::new(FORK).forked_from(UPSTREAM));
    host.set_ref(UPSTREAM, "refs/heads/master", &sha('a'));
    host
}

async fn open(host: &MockHost, name: &str) -> RepoContext {
    let ctx = RepoContext::open(
        Arc::new(host.clone()),
        &Config::default(),
        &document::empty(),
        name,
    )
    .await
    .unwrap();
    host.clear_operations();
    ctx
}

fn updates(host: &MockHost) -> Vec<Oid> {
    host.operations()
        .into_iter()
        .filter_map(|op| match op {
            MockOperation::UpdateRef { sha, .. } => Some(sha),
            _ => None,
        })
        .collect()
}

mod states {
    use super::*;

    #[tokio::test]
    async fn missing_branch_created_at_origin() {
        let host = fleet();
        let ctx = open(&host, FORK).await;

        let outcome = ctx.sync_branch("master", None).await.unwrap();

        assert_eq!(outcome.state, SyncState::Missing);
        assert_eq!(outcome.sha, oid('a'));
        assert_eq!(host.write_count(), 1);
        assert!(host.operations().contains(&MockOperation::CreateRef {
            repo: FORK.into(),
            name: master(),
            sha: oid('a'),
        }));
        assert_eq!(host.ref_sha(FORK, "refs/heads/master"), Some(oid('a')));
    }

    #[tokio::test]
    async fn equal_branch_is_noop() {
        let host = fleet();
        host.set_ref(FORK, "refs/heads/master", &sha('a'));
        let ctx = open(&host, FORK).await;

        let outcome = ctx.sync_branch("master", None).await.unwrap();

        assert_eq!(outcome.state, SyncState::InSync);
        assert!(!outcome.changed());
        assert_eq!(host.write_count(), 0);
    }

    #[tokio::test]
    async fn diverged_branch_updated_once() {
        let host = fleet();
        host.set_ref(FORK, "refs/heads/master", &sha('b'));
        let ctx = open(&host, FORK).await;

        let outcome = ctx.sync_branch("master", None).await.unwrap();

        assert_eq!(outcome.state, SyncState::Diverged);
        assert_eq!(updates(&host), vec![oid('a')]);
        assert_eq!(host.write_count(), 1);
        assert!(matches!(
            host.operations().last(),
            Some(MockOperation::UpdateRef { force: false, .. })
        ));
    }

    #[tokio::test]
    async fn fork_branch_synced_from_other_upstream_branch() {
        let host = fleet();
        host.set_ref(UPSTREAM, "refs/heads/release", &sha('d'));
        let ctx = open(&host, FORK).await;

        let outcome = ctx
            .sync_branch_from("release", None, "release")
            .await
            .unwrap();

        assert_eq!(outcome.sha, oid('d'));
        assert_eq!(host.ref_sha(FORK, "refs/heads/release"), Some(oid('d')));
    }

    #[tokio::test]
    async fn override_replaces_recorded_parent() {
        let host = fleet().with_repository(Repository::new("other/snap-plugin-collector-cpu"));
        host.set_ref("other/snap-plugin-collector-cpu", "refs/heads/master", &sha('e'));
        let ctx = open(&host, FORK).await;

        let outcome = ctx
            .sync_branch("master", Some("other/snap-plugin-collector-cpu"))
            .await
            .unwrap();

        assert_eq!(outcome.sha, oid('e'));
    }
}

mod conflicts {
    use super::*;

    #[tokio::test]
    async fn retry_uses_freshly_resolved_origin() {
        let host = fleet()
            .fail_on_times(FailOn::UpdateRef(HostError::Conflict("stale".into())), 1)
            .move_ref_on_failure(UPSTREAM, "refs/heads/master", &sha('c'));
        host.set_ref(FORK, "refs/heads/master", &sha('b'));
        let ctx = open(&host, FORK).await;

        let outcome = ctx.sync_branch("master", None).await.unwrap();

        assert_eq!(outcome.state, SyncState::ConflictRetried);
        assert_eq!(outcome.sha, oid('c'));
        assert_eq!(updates(&host), vec![oid('a'), oid('c')]);

        // The second upstream resolution happens after the failed update.
        let ops = host.operations();
        let first_update = ops
            .iter()
            .position(|op| matches!(op, MockOperation::UpdateRef { .. }))
            .unwrap();
        let upstream_listings: Vec<usize> = ops
            .iter()
            .enumerate()
            .filter(|(_, op)| matches!(op, MockOperation::ListRefs { repo } if repo == UPSTREAM))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(upstream_listings.len(), 2);
        assert!(upstream_listings[1] > first_update);
    }

    #[tokio::test]
    async fn second_conflict_is_fatal() {
        let host =
            fleet().fail_on_times(FailOn::UpdateRef(HostError::Conflict("stale".into())), 2);
        host.set_ref(FORK, "refs/heads/master", &sha('b'));
        let ctx = open(&host, FORK).await;

        let err = ctx.sync_branch("master", None).await.unwrap_err();

        assert!(matches!(err, RepoError::SyncConflict { .. }));
        assert_eq!(updates(&host).len(), 2);
        assert_eq!(host.ref_sha(FORK, "refs/heads/master"), Some(oid('b')));
    }

    #[tokio::test]
    async fn non_conflict_errors_not_retried() {
        let host = fleet().fail_on(FailOn::UpdateRef(HostError::ApiError {
            status: 500,
            message: "boom".into(),
        }));
        host.set_ref(FORK, "refs/heads/master", &sha('b'));
        let ctx = open(&host, FORK).await;

        let err = ctx.sync_branch("master", None).await.unwrap_err();

        assert!(matches!(
            err,
            RepoError::Host(HostError::ApiError { status: 500, .. })
        ));
        assert_eq!(updates(&host).len(), 1);
    }
}

mod configuration {
    use super::*;

    #[tokio::test]
    async fn not_a_fork_without_override() {
        let host = MockHost::new().with_repository(Repository::new(FORK));
        let ctx = open(&host, FORK).await;

        let err = ctx.sync_branch("master", None).await.unwrap_err();

        assert!(matches!(err, RepoError::Configuration(_)));
        assert_eq!(
            err.to_string(),
            format!("configuration error: {} is not a fork and no origin specified", FORK)
        );
        assert!(host.operations().is_empty());
        assert_eq!(host.write_count(), 0);
    }

    #[tokio::test]
    async fn missing_upstream_branch_is_not_found() {
        let host = fleet();
        let ctx = open(&host, FORK).await;

        let err = ctx
            .sync_branch_from("master", None, "nonexistent")
            .await
            .unwrap_err();

        assert!(matches!(err, RepoError::Host(HostError::NotFound(_))));
        assert_eq!(host.write_count(), 0);
    }

    #[tokio::test]
    async fn invalid_branch_name_rejected_before_host_calls() {
        let host = fleet();
        let ctx = open(&host, FORK).await;

        let err = ctx.sync_branch("-bad", None).await.unwrap_err();

        assert!(matches!(err, RepoError::InvalidName(_)));
        assert!(host.operations().is_empty());
    }
}
