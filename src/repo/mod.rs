//! repo
//!
//! Per-repository maintenance operations.
//!
//! # Architecture
//!
//! A [`RepoContext`] wraps one repository and an injected host client. It
//! owns the four components and hands each operation to the right one:
//!
//! - [`refs::RefResolver`] - ref name to commit id
//! - [`sync::ForkSyncEngine`] - keeps fork branches on their upstream
//! - [`publish::ContentCommitPipeline`] - commits generated files
//! - [`metadata::MetadataResolver`] - metadata document and sync configuration
//!
//! Operations on one context run strictly one host call at a time. The
//! metadata document and the sync configuration are computed once per
//! context; contexts never share cached results.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use pluginsync::core::config::Config;
//! use pluginsync::core::document;
//! use pluginsync::host::mock::MockHost;
//! use pluginsync::host::Repository;
//! use pluginsync::repo::RepoContext;
//!
//! # tokio_test::block_on(async {
//! let host = MockHost::new().with_repository(
//!     Repository::new("me/snap-plugin-collector-cpu")
//!         .forked_from("intelsdi-x/snap-plugin-collector-cpu"),
//! );
//! host.add_repository(Repository::new("intelsdi-x/snap-plugin-collector-cpu"));
//! host.seed_branch("intelsdi-x/snap-plugin-collector-cpu", "master", &[("README.md", "cpu")]);
//!
//! let ctx = RepoContext::open(
//!     Arc::new(host),
//!     &Config::default(),
//!     &document::empty(),
//!     "me/snap-plugin-collector-cpu",
//! )
//! .await
//! .unwrap();
//!
//! let outcome = ctx.sync_branch("master", None).await.unwrap();
//! assert!(outcome.changed());
//! # });
//! ```

pub mod artifacts;
pub mod metadata;
pub mod publish;
pub mod refs;
pub mod sync;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_yaml::Value;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::core::config::Config;
use crate::core::document::{self, DocumentError};
use crate::core::identity::{IdentityError, PluginIdentity};
use crate::core::types::{BranchName, TypeError};
use crate::host::{
    GitHost, HostError, NewPullRequest, PullRequest, Repository, TrafficPeriod, TrafficStats,
};

use artifacts::PlatformArtifact;
use metadata::{MetadataDocument, MetadataResolver};
use publish::{ContentCommitPipeline, PublishReceipt, PROTECTED_BRANCH};
use refs::RefResolver;
use sync::{ForkSyncEngine, SyncOutcome, SyncTarget, DEFAULT_UPSTREAM_BRANCH};

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The repository cannot be operated on as configured.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A fork ref update conflicted again after re-resolving the upstream.
    #[error("sync conflict on {repo} branch {branch}: ref moved again after retry")]
    SyncConflict { repo: String, branch: String },

    /// The operation targets something that must not be written directly.
    #[error("policy violation: {0}")]
    Policy(String),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    InvalidName(#[from] TypeError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Host(#[from] HostError),
}

/// One repository and everything needed to maintain it.
pub struct RepoContext {
    host: Arc<dyn GitHost>,
    repository: Repository,
    org: String,
    identity: Result<PluginIdentity, IdentityError>,
    supported: bool,
    artifact_url_template: String,
    resolver: RefResolver,
    sync_engine: ForkSyncEngine,
    pipeline: ContentCommitPipeline,
    metadata: MetadataResolver,
    sync_config: OnceCell<Value>,
    metadata_doc: OnceCell<MetadataDocument>,
    permission_warned: AtomicBool,
}

impl RepoContext {
    /// Open a context for `full_name`.
    ///
    /// `org_defaults` is the organization `config_defaults` document (see
    /// [`Config::org_defaults`]).
    ///
    /// # Errors
    ///
    /// `RepoError::Configuration` if the repository does not exist or is not
    /// visible to the client. Host errors propagate.
    pub async fn open(
        host: Arc<dyn GitHost>,
        config: &Config,
        org_defaults: &Value,
        full_name: &str,
    ) -> Result<Self, RepoError> {
        if !host.repository_exists(full_name).await? {
            return Err(RepoError::Configuration(format!(
                "repository {} is not accessible",
                full_name
            )));
        }
        let repository = host.get_repository(full_name).await?;
        Ok(Self::new(host, config, org_defaults, repository))
    }

    /// Build a context around an already fetched repository.
    pub fn new(
        host: Arc<dyn GitHost>,
        config: &Config,
        org_defaults: &Value,
        repository: Repository,
    ) -> Self {
        let identity = PluginIdentity::parse(&repository.name);
        if let Err(e) = &identity {
            tracing::debug!(repo = %repository.full_name, error = %e, "no plugin identity");
        }

        Self {
            resolver: RefResolver::new(Arc::clone(&host)),
            sync_engine: ForkSyncEngine::new(Arc::clone(&host)),
            pipeline: ContentCommitPipeline::new(
                Arc::clone(&host),
                config.org(),
                config.tool_name(),
            ),
            metadata: MetadataResolver::new(
                Arc::clone(&host),
                config.org(),
                org_defaults.clone(),
                config.ci_badge_template(),
                config.artifact_url_template(),
            ),
            host,
            repository,
            org: config.org().to_string(),
            identity,
            supported: false,
            artifact_url_template: config.artifact_url_template().to_string(),
            sync_config: OnceCell::new(),
            metadata_doc: OnceCell::new(),
            permission_warned: AtomicBool::new(false),
        }
    }

    /// Mark the plugin as supported in its metadata.
    pub fn with_supported(mut self, supported: bool) -> Self {
        self.supported = supported;
        self
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    pub fn resolver(&self) -> &RefResolver {
        &self.resolver
    }

    /// Plugin identity derived from the repository name.
    ///
    /// # Errors
    ///
    /// `RepoError::Identity` if the name does not follow the plugin convention.
    pub fn identity(&self) -> Result<&PluginIdentity, RepoError> {
        self.identity
            .as_ref()
            .map_err(|e| RepoError::Identity(e.clone()))
    }

    /// Whether the repository belongs to the managed organization.
    pub fn is_org_owned(&self) -> bool {
        self.metadata.is_org_owned(&self.repository)
    }

    /// Sync `branch` of this fork with the upstream `master`.
    ///
    /// The upstream is `upstream_override` if given, else the recorded fork
    /// parent.
    pub async fn sync_branch(
        &self,
        branch: &str,
        upstream_override: Option<&str>,
    ) -> Result<SyncOutcome, RepoError> {
        self.sync_branch_from(branch, upstream_override, DEFAULT_UPSTREAM_BRANCH)
            .await
    }

    /// Sync `branch` of this fork with `upstream_branch` of the upstream.
    pub async fn sync_branch_from(
        &self,
        branch: &str,
        upstream_override: Option<&str>,
        upstream_branch: &str,
    ) -> Result<SyncOutcome, RepoError> {
        let target = SyncTarget::for_fork(
            &self.repository,
            BranchName::new(branch)?,
            upstream_override,
            BranchName::new(upstream_branch)?,
        )?;
        self.sync_engine.sync(&target).await
    }

    /// Commit `content` to `path` on `branch`.
    pub async fn publish(
        &self,
        path: &str,
        content: &[u8],
        branch: &str,
    ) -> Result<PublishReceipt, RepoError> {
        let branch = BranchName::new(branch)?;
        self.pipeline
            .publish(&self.repository, path, content, &branch)
            .await
    }

    /// Open a pull request from `branch` of this repository against the
    /// upstream's `master`.
    pub async fn create_pull_request(
        &self,
        upstream: &str,
        branch: &str,
        message: &str,
    ) -> Result<PullRequest, RepoError> {
        let branch = BranchName::new(branch)?;
        let request = NewPullRequest {
            base: PROTECTED_BRANCH.to_string(),
            head: format!("{}:{}", self.repository.owner, branch),
            title: message.to_string(),
            body: None,
        };
        let pr = self.host.create_pull_request(upstream, request).await?;
        tracing::info!(repo = upstream, head = %branch, number = pr.number, "opened pull request");
        Ok(pr)
    }

    /// Merged sync configuration, computed once per context.
    pub async fn sync_config(&self) -> &Value {
        self.sync_config
            .get_or_init(|| self.metadata.sync_config(&self.repository))
            .await
    }

    /// Look up a path in the merged sync configuration.
    pub async fn sync_config_value(&self, path: &[&str]) -> Option<&Value> {
        document::deep_fetch(self.sync_config().await, path)
    }

    /// Metadata document, computed once per context.
    ///
    /// # Errors
    ///
    /// - `RepoError::Identity` if the name does not follow the plugin convention
    /// - host errors from listing releases
    pub async fn metadata(&self) -> Result<&MetadataDocument, RepoError> {
        let identity = self.identity()?;
        let sync_config = self.sync_config().await;
        self.metadata_doc
            .get_or_try_init(|| async {
                self.metadata
                    .metadata(&self.repository, identity, self.supported, sync_config)
                    .await
                    .map_err(RepoError::from)
            })
            .await
    }

    /// Artifact URLs of `build_id` for every platform in the build matrix.
    pub async fn build_artifact_urls(&self, build_id: &str) -> Vec<PlatformArtifact> {
        artifacts::build_artifact_urls(
            self.sync_config().await,
            &self.artifact_url_template,
            &self.repository.name,
            build_id,
        )
    }

    /// Raw file content. `Ok(None)` if the file does not exist.
    pub async fn content(&self, path: &str) -> Result<Option<Vec<u8>>, RepoError> {
        Ok(self
            .host
            .get_file_content(&self.repository.full_name, path)
            .await?)
    }

    /// Parsed YAML file. `Ok(None)` if the file does not exist.
    ///
    /// # Errors
    ///
    /// Fetch failures and parse failures stay distinct: `RepoError::Host`
    /// and `RepoError::Document` respectively.
    pub async fn yml_content(&self, path: &str) -> Result<Option<Value>, RepoError> {
        self.metadata
            .fetch_document(&self.repository.full_name, path)
            .await
    }

    /// Clone traffic; `Ok(None)` if the token lacks the required scope.
    pub async fn clone_stats(
        &self,
        period: TrafficPeriod,
    ) -> Result<Option<TrafficStats>, RepoError> {
        let result = self
            .host
            .get_clone_stats(&self.repository.full_name, period)
            .await;
        self.downgrade_permission(result)
    }

    /// View traffic; `Ok(None)` if the token lacks the required scope.
    pub async fn view_stats(
        &self,
        period: TrafficPeriod,
    ) -> Result<Option<TrafficStats>, RepoError> {
        let result = self
            .host
            .get_view_stats(&self.repository.full_name, period)
            .await;
        self.downgrade_permission(result)
    }

    /// Map `PermissionDenied` to `None`, warning once per context.
    fn downgrade_permission<T>(
        &self,
        result: Result<T, HostError>,
    ) -> Result<Option<T>, RepoError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(HostError::PermissionDenied(reason)) => {
                if !self.permission_warned.swap(true, Ordering::Relaxed) {
                    tracing::warn!(
                        repo = %self.repository.full_name,
                        reason = %reason,
                        "insufficient permission for traffic statistics"
                    );
                }
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Organization login this context was opened under.
    pub fn org(&self) -> &str {
        &self.org
    }
}

impl std::fmt::Debug for RepoContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoContext")
            .field("host", &self.host.name())
            .field("repository", &self.repository.full_name)
            .field("identity", &self.identity)
            .field("supported", &self.supported)
            .finish_non_exhaustive()
    }
}
