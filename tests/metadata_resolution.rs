//! Integration tests for metadata documents, sync configuration and
//! artifact URLs.

use std::sync::Arc;

use serde_yaml::Value;

use pluginsync::core::config::{Config, SettingsFile};
use pluginsync::core::document;
use pluginsync::host::mock::{FailOn, MockHost, MockOperation};
use pluginsync::host::{HostError, Release, Repository};
use pluginsync::repo::RepoContext;

const ORG: &str = "intelsdi-x";
const CPU: &str = "intelsdi-x/snap-plugin-collector-cpu";

fn yaml(text: &str) -> Value {
    serde_yaml::from_str(text).unwrap()
}

fn release(tag: &str) -> Release {
    Release {
        tag_name: tag.into(),
        html_url: format!("https://github.com/{}/releases/tag/{}", CPU, tag),
        published_at: None,
    }
}

async fn open_with(host: &MockHost, config: &Config, defaults: &Value, name: &str) -> RepoContext {
    RepoContext::open(Arc::new(host.clone()), config, defaults, name)
        .await
        .unwrap()
}

async fn open(host: &MockHost, name: &str) -> RepoContext {
    open_with(host, &Config::default(), &document::empty(), name).await
}

mod badge {
    use super::*;

    #[tokio::test]
    async fn attached_for_org_repository() {
        let host = MockHost::new().with_repository(Repository::new(CPU));
        let ctx = open(&host, CPU).await;

        let doc = ctx.metadata().await.unwrap();
        assert_eq!(
            doc.get("ci"),
            Some(&yaml(
                "['https://travis-ci.org/intelsdi-x/snap-plugin-collector-cpu.svg?branch=master']"
            ))
        );
    }

    #[tokio::test]
    async fn absent_outside_org() {
        let name = "someone/snap-plugin-collector-cpu";
        let host = MockHost::new().with_repository(Repository::new(name));
        let ctx = open(&host, name).await;

        assert!(!ctx.metadata().await.unwrap().contains_key("ci"));
    }

    #[tokio::test]
    async fn absent_for_mesos() {
        let name = "intelsdi-x/snap-plugin-collector-mesos";
        let host = MockHost::new().with_repository(Repository::new(name));
        let ctx = open(&host, name).await;

        let doc = ctx.metadata().await.unwrap();
        assert_eq!(doc.get_str("name"), Some("Mesos"));
        assert!(!doc.contains_key("ci"));
    }

    #[tokio::test]
    async fn overlay_badge_kept() {
        let host = MockHost::new().with_repository(Repository::new(CPU));
        host.put_file(CPU, "metadata.yml", "ci: [custom]\n");
        let ctx = open(&host, CPU).await;

        assert_eq!(ctx.metadata().await.unwrap().get("ci"), Some(&yaml("[custom]")));
    }
}

mod overlay {
    use super::*;

    #[tokio::test]
    async fn overlay_wins_and_name_normalized() {
        let host = MockHost::new()
            .with_repository(Repository::new(CPU).with_description("Collects CPU metrics"));
        host.put_file(
            CPU,
            "metadata.yml",
            "name: cpu_stats\ndescription: Overridden\nextra: 1\n",
        );
        let ctx = open(&host, CPU).await.with_supported(true);

        let doc = ctx.metadata().await.unwrap();
        assert_eq!(doc.get_str("name"), Some("CPU Stats"));
        assert_eq!(doc.get_str("description"), Some("Overridden"));
        assert_eq!(doc.get("supported"), Some(&Value::Bool(true)));
        assert!(doc.contains_key("extra"));
        assert_eq!(doc.keys().last(), Some("extra"));
    }

    #[tokio::test]
    async fn core_maintainer_rewritten() {
        let host = MockHost::new().with_repository(Repository::new(CPU));
        host.put_file(CPU, "metadata.yml", "maintainer: core\n");
        let ctx = open(&host, CPU).await;

        assert_eq!(ctx.metadata().await.unwrap().get_str("maintainer"), Some(ORG));
    }

    #[tokio::test]
    async fn other_maintainer_kept() {
        let host = MockHost::new().with_repository(Repository::new(CPU));
        host.put_file(CPU, "metadata.yml", "maintainer: someone\n");
        let ctx = open(&host, CPU).await;

        assert_eq!(
            ctx.metadata().await.unwrap().get_str("maintainer"),
            Some("someone")
        );
    }

    #[tokio::test]
    async fn malformed_overlay_ignored() {
        let host = MockHost::new().with_repository(Repository::new(CPU));
        host.put_file(CPU, "metadata.yml", "name: [unclosed");
        let ctx = open(&host, CPU).await;

        let doc = ctx.metadata().await.unwrap();
        assert_eq!(doc.get_str("name"), Some("CPU"));
    }

    #[tokio::test]
    async fn overlay_fetch_failure_ignored() {
        let host = MockHost::new()
            .with_repository(Repository::new(CPU))
            .fail_on(FailOn::GetFileContent(HostError::NetworkError("reset".into())));
        let ctx = open(&host, CPU).await;

        let doc = ctx.metadata().await.unwrap();
        assert_eq!(doc.get_str("name"), Some("CPU"));
        assert_eq!(doc.get_str("maintainer"), Some(ORG));
    }
}

mod releases {
    use super::*;

    #[tokio::test]
    async fn release_url_only_with_releases() {
        let host = MockHost::new().with_repository(Repository::new(CPU));
        let ctx = open(&host, CPU).await;
        let doc = ctx.metadata().await.unwrap();
        assert!(!doc.contains_key("release_url"));
        assert!(!doc.contains_key("download"));

        let host = MockHost::new().with_repository(Repository::new(CPU));
        host.add_release(CPU, release("9"));
        let ctx = open(&host, CPU).await;
        let doc = ctx.metadata().await.unwrap();
        assert_eq!(
            doc.get_str("release_url"),
            Some("https://github.com/intelsdi-x/snap-plugin-collector-cpu/releases/latest")
        );
        assert!(doc.contains_key("download"));
    }

    #[tokio::test]
    async fn release_listing_errors_propagate() {
        let host = MockHost::new()
            .with_repository(Repository::new(CPU))
            .fail_on(FailOn::ListReleases(HostError::RateLimited));
        let ctx = open(&host, CPU).await;

        assert!(ctx.metadata().await.is_err());
    }
}

mod memoization {
    use super::*;

    #[tokio::test]
    async fn computed_once_per_context() {
        let host = MockHost::new().with_repository(Repository::new(CPU));
        let ctx = open(&host, CPU).await;

        let first = ctx.metadata().await.unwrap().clone();
        let second = ctx.metadata().await.unwrap().clone();
        assert_eq!(first, second);

        let listings = host
            .operations()
            .iter()
            .filter(|op| matches!(op, MockOperation::ListReleases { .. }))
            .count();
        assert_eq!(listings, 1);
    }

    #[tokio::test]
    async fn contexts_do_not_share_results() {
        let host = MockHost::new().with_repository(Repository::new(CPU));
        let first = open(&host, CPU).await;
        first.metadata().await.unwrap();

        host.put_file(CPU, "metadata.yml", "maintainer: someone\n");
        let second = open(&host, CPU).await;

        assert_eq!(second.metadata().await.unwrap().get_str("maintainer"), Some("someone"));
        assert_eq!(first.metadata().await.unwrap().get_str("maintainer"), Some(ORG));
    }
}

mod end_to_end {
    use super::*;

    #[tokio::test]
    async fn build_matrix_replaces_defaults_and_expands() {
        let name = "org/org-plugin-collector-cpu";
        let config = Config::from_settings(SettingsFile {
            org: Some("org".into()),
            ..Default::default()
        })
        .unwrap();
        let defaults = yaml("global: {build: {matrix: []}}");
        let host = MockHost::new().with_repository(Repository::new(name));
        host.put_file(
            name,
            ".sync.yml",
            "global:\n  build:\n    matrix:\n      - GOOS: linux\n        GOARCH: amd64\n",
        );
        let ctx = open_with(&host, &config, &defaults, name).await;

        assert_eq!(
            ctx.sync_config_value(&["global", "build", "matrix"]).await,
            Some(&yaml("[{GOOS: linux, GOARCH: amd64}]"))
        );

        let urls = ctx.build_artifact_urls("v1").await;
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].platform_key(), "linux/x86_64");
        assert_eq!(
            urls[0].url,
            "http://snap.ci.snap-telemetry.io/plugins/org-plugin-collector-cpu/v1/linux/x86_64/org-plugin-collector-cpu"
        );

        let doc = ctx.metadata().await.unwrap();
        assert_eq!(doc.get_str("type"), Some("collector"));
        assert_eq!(doc.get_str("name"), Some("CPU"));
    }

    #[tokio::test]
    async fn defaults_fill_missing_keys() {
        let defaults = yaml("global: {build: {go: '1.7', matrix: [{GOOS: linux, GOARCH: amd64}]}}");
        let host = MockHost::new().with_repository(Repository::new(CPU));
        host.put_file(CPU, ".sync.yml", "global: {build: {go: '1.8'}}\n");
        let ctx = open_with(&host, &Config::default(), &defaults, CPU).await;

        assert_eq!(
            ctx.sync_config().await,
            &yaml("global: {build: {go: '1.8', matrix: [{GOOS: linux, GOARCH: amd64}]}}")
        );
        assert_eq!(ctx.build_artifact_urls("3").await.len(), 1);
    }

    #[tokio::test]
    async fn non_org_repository_has_empty_sync_config() {
        let name = "someone/snap-plugin-collector-cpu";
        let defaults = yaml("global: {build: {matrix: [{GOOS: linux, GOARCH: amd64}]}}");
        let host = MockHost::new().with_repository(Repository::new(name));
        host.put_file(name, ".sync.yml", "global: {x: 1}\n");
        let ctx = open_with(&host, &Config::default(), &defaults, name).await;

        assert_eq!(ctx.sync_config().await, &document::empty());
        assert!(ctx.build_artifact_urls("1").await.is_empty());
    }

    #[tokio::test]
    async fn metadata_serializes_to_json() {
        let host = MockHost::new().with_repository(Repository::new(CPU));
        let ctx = open(&host, CPU).await;

        let json: serde_json::Value =
            serde_json::from_str(&ctx.metadata().await.unwrap().to_json().unwrap()).unwrap();
        assert_eq!(json["name"], "CPU");
        assert_eq!(json["type"], "collector");
        assert_eq!(json["supported"], false);
        assert_eq!(json["repo_url"], "https://github.com/intelsdi-x/snap-plugin-collector-cpu");
    }
}
