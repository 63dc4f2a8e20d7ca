//! host::traits
//!
//! The `GitHost` trait and the request/response types shared by its
//! implementations.
//!
//! # Design
//!
//! The trait is async because every operation is a network round trip. The
//! core never issues two calls for the same repository concurrently; callers
//! await each call before starting the next.
//!
//! Paginated listings (`list_refs`, `list_releases`) are fully materialized
//! by the implementation before returning.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{Oid, RefName};

/// Errors from host operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    /// Authentication failed (invalid or expired token).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The token is valid but lacks the scope for this operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A ref update was rejected because the ref moved since it was read
    /// (non-fast-forward or stale pointer).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Network or connection error.
    #[error("network error: {0}")]
    NetworkError(String),
}

impl HostError {
    /// Whether this error signals an optimistic concurrency conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, HostError::Conflict(_))
    }
}

/// Repository identity as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// `owner/name`
    pub full_name: String,
    /// Short repository name
    pub name: String,
    /// Owner login
    pub owner: String,
    /// Description, if set
    pub description: Option<String>,
    /// Web URL
    pub html_url: String,
    /// Whether the repository is a fork
    pub fork: bool,
    /// Full name of the fork parent
    pub parent: Option<String>,
}

impl Repository {
    /// Build a repository record from a full name, deriving owner and URL.
    ///
    /// # Example
    ///
    /// ```
    /// use pluginsync::host::Repository;
    ///
    /// let repo = Repository::new("intelsdi-x/snap-plugin-collector-cpu");
    /// assert_eq!(repo.owner, "intelsdi-x");
    /// assert_eq!(repo.name, "snap-plugin-collector-cpu");
    /// assert!(!repo.fork);
    /// ```
    pub fn new(full_name: impl Into<String>) -> Self {
        let full_name = full_name.into();
        let (owner, name) = full_name
            .split_once('/')
            .map(|(o, n)| (o.to_string(), n.to_string()))
            .unwrap_or_else(|| (String::new(), full_name.clone()));
        Self {
            html_url: format!("https://github.com/{}", full_name),
            full_name,
            name,
            owner,
            description: None,
            fork: false,
            parent: None,
        }
    }

    /// Mark the repository as a fork of `parent`.
    pub fn forked_from(mut self, parent: impl Into<String>) -> Self {
        self.fork = true;
        self.parent = Some(parent.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A named pointer to a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitRef {
    pub name: RefName,
    pub sha: Oid,
}

/// A commit as returned by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub sha: Oid,
    pub tree: Oid,
    pub parents: Vec<Oid>,
    pub message: String,
}

/// Encoding of blob content sent to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlobEncoding {
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "base64")]
    Base64,
}

/// Blob creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBlob {
    pub content: String,
    pub encoding: BlobEncoding,
}

impl NewBlob {
    /// Encode raw bytes as a base64 blob.
    pub fn base64(bytes: &[u8]) -> Self {
        use base64::Engine as _;

        Self {
            content: base64::engine::general_purpose::STANDARD.encode(bytes),
            encoding: BlobEncoding::Base64,
        }
    }
}

/// File mode of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileMode {
    #[serde(rename = "100644")]
    File,
    #[serde(rename = "100755")]
    Executable,
}

/// A tree entry pointing at an existing blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub mode: FileMode,
    pub sha: Oid,
}

/// Commit creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCommit {
    pub message: String,
    pub tree: Oid,
    pub parents: Vec<Oid>,
}

/// Pull request creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    /// Base branch in the target repository
    pub base: String,
    /// Head in `owner:branch` form
    pub head: String,
    pub title: String,
    pub body: Option<String>,
}

/// A created pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub url: String,
}

/// A published release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub tag_name: String,
    pub html_url: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Traffic aggregation period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrafficPeriod {
    #[default]
    Day,
    Week,
}

impl std::fmt::Display for TrafficPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrafficPeriod::Day => write!(f, "day"),
            TrafficPeriod::Week => write!(f, "week"),
        }
    }
}

/// One bucket of traffic counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficSample {
    pub timestamp: DateTime<Utc>,
    pub count: u64,
    pub uniques: u64,
}

/// Clone or view traffic for a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficStats {
    pub count: u64,
    pub uniques: u64,
    pub samples: Vec<TrafficSample>,
}

/// The git hosting service.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so one client can be shared by
/// several repository contexts.
///
/// # Error Handling
///
/// - `update_ref` must report a moved ref as `HostError::Conflict`.
/// - `get_file_content` reports a missing file as `Ok(None)`.
/// - `get_clone_stats` / `get_view_stats` report missing scope as
///   `HostError::PermissionDenied`.
#[async_trait]
pub trait GitHost: Send + Sync {
    /// Get the host name (e.g., "github").
    fn name(&self) -> &'static str;

    /// Whether the repository exists and is visible to the client.
    async fn repository_exists(&self, repo: &str) -> Result<bool, HostError>;

    /// Fetch repository identity.
    async fn get_repository(&self, repo: &str) -> Result<Repository, HostError>;

    /// List every ref of the repository.
    async fn list_refs(&self, repo: &str) -> Result<Vec<GitRef>, HostError>;

    /// Create a new ref.
    async fn create_ref(&self, repo: &str, name: &RefName, sha: &Oid) -> Result<GitRef, HostError>;

    /// Move an existing ref.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the update is not a fast-forward (and `force` is off)
    ///   or the ref moved concurrently
    /// - `NotFound` if the ref does not exist
    async fn update_ref(
        &self,
        repo: &str,
        name: &RefName,
        sha: &Oid,
        force: bool,
    ) -> Result<GitRef, HostError>;

    /// Look up a single ref.
    async fn get_ref(&self, repo: &str, name: &RefName) -> Result<GitRef, HostError>;

    /// Fetch a commit.
    async fn get_commit(&self, repo: &str, sha: &Oid) -> Result<Commit, HostError>;

    /// Create a blob, returning its id.
    async fn create_blob(&self, repo: &str, blob: NewBlob) -> Result<Oid, HostError>;

    /// Create a tree from entries layered on `base_tree`, returning its id.
    async fn create_tree(
        &self,
        repo: &str,
        entries: Vec<TreeEntry>,
        base_tree: Option<&Oid>,
    ) -> Result<Oid, HostError>;

    /// Create a commit.
    async fn create_commit(&self, repo: &str, commit: NewCommit) -> Result<Commit, HostError>;

    /// Open a pull request against `repo`.
    async fn create_pull_request(
        &self,
        repo: &str,
        request: NewPullRequest,
    ) -> Result<PullRequest, HostError>;

    /// Fetch a file from the default branch. `Ok(None)` if it does not exist.
    async fn get_file_content(&self, repo: &str, path: &str) -> Result<Option<Vec<u8>>, HostError>;

    /// List published releases, newest first.
    async fn list_releases(&self, repo: &str) -> Result<Vec<Release>, HostError>;

    /// Clone traffic.
    async fn get_clone_stats(
        &self,
        repo: &str,
        period: TrafficPeriod,
    ) -> Result<TrafficStats, HostError>;

    /// Page view traffic.
    async fn get_view_stats(
        &self,
        repo: &str,
        period: TrafficPeriod,
    ) -> Result<TrafficStats, HostError>;
}
