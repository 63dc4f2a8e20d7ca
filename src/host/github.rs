//! host::github
//!
//! GitHub implementation of [`GitHost`] over the REST v3 API.
//!
//! # Design
//!
//! One client serves every repository; each call names the repository it
//! acts on (`owner/name`). The client holds no per-call state.
//!
//! Git data endpoints used:
//! - `git/refs` (list, create, update) and `git/ref/{ref}` (lookup)
//! - `git/commits`, `git/blobs`, `git/trees`
//!
//! # Error Mapping
//!
//! - 401 → `AuthFailed`, 403 → `PermissionDenied` (or `RateLimited` when the
//!   rate limit is exhausted), 404 → `NotFound`, 429 → `RateLimited`
//! - 409/422 on a ref update → `Conflict`
//! - 409 on ref listing ("Git Repository is empty") → no refs
//!
//! No request is retried here.
//!
//! # Example
//!
//! ```ignore
//! use pluginsync::host::{GitHost, github::GitHubHost};
//!
//! let host = GitHubHost::new(Some(token));
//! let refs = host.list_refs("intelsdi-x/snap-plugin-collector-cpu").await?;
//! ```

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::traits::{
    BlobEncoding, Commit, FileMode, GitHost, GitRef, HostError, NewBlob, NewCommit,
    NewPullRequest, PullRequest, Release, Repository, TrafficPeriod, TrafficSample, TrafficStats,
    TreeEntry,
};
use crate::core::config::{Config, DEFAULT_API_BASE};
use crate::core::types::{Oid, RefName};

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "pluginsync";

/// Page size for paginated listings (GitHub maximum).
const PER_PAGE: usize = 100;

/// GitHub host client.
pub struct GitHubHost {
    /// HTTP client for making requests
    client: Client,
    /// Access token; anonymous requests when `None`
    token: Option<String>,
    /// API base URL (configurable for GitHub Enterprise)
    api_base: String,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for GitHubHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubHost")
            .field("has_token", &self.token.is_some())
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl GitHubHost {
    /// Create a client for api.github.com.
    pub fn new(token: Option<String>) -> Self {
        Self::with_api_base(token, DEFAULT_API_BASE)
    }

    /// Create a client for a custom API base URL.
    pub fn with_api_base(token: Option<String>, api_base: impl Into<String>) -> Self {
        let api_base: String = api_base.into();
        Self {
            client: Client::new(),
            token,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Create a client using the configured API base.
    pub fn from_config(config: &Config, token: Option<String>) -> Self {
        Self::with_api_base(token, config.api_base())
    }

    /// Build common headers for API requests.
    fn headers(&self) -> Result<HeaderMap, HostError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| HostError::AuthFailed("token contains invalid characters".into()))?;
            headers.insert(AUTHORIZATION, value);
        }
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        Ok(headers)
    }

    /// Build URL for a repository endpoint.
    fn repo_url(&self, repo: &str, path: &str) -> String {
        if path.is_empty() {
            format!("{}/repos/{}", self.api_base, repo)
        } else {
            format!("{}/repos/{}/{}", self.api_base, repo, path)
        }
    }

    /// Attach headers and send.
    async fn execute(&self, request: RequestBuilder) -> Result<Response, HostError> {
        request
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|e| HostError::NetworkError(e.to_string()))
    }

    /// Handle API response, mapping errors appropriately.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: Response,
    ) -> Result<T, HostError> {
        let status = response.status();

        if status.is_success() {
            response.json().await.map_err(|e| HostError::ApiError {
                status: status.as_u16(),
                message: format!("Failed to parse response: {}", e),
            })
        } else {
            Err(self.error_from_response(response).await)
        }
    }

    /// Map a non-success response to a `HostError`.
    async fn error_from_response(&self, response: Response) -> HostError {
        let status = response.status();
        let rate_limit_exhausted = response
            .headers()
            .get("X-RateLimit-Remaining")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == "0")
            .unwrap_or(false);
        let accepted_scopes = response
            .headers()
            .get("X-Accepted-OAuth-Scopes")
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());

        let message = match response.json::<GitHubErrorResponse>().await {
            Ok(err) => err.message,
            Err(_) => "Unknown error".to_string(),
        };

        match status {
            StatusCode::UNAUTHORIZED => HostError::AuthFailed("Invalid or expired token".into()),
            StatusCode::FORBIDDEN if rate_limit_exhausted => HostError::RateLimited,
            StatusCode::FORBIDDEN => match accepted_scopes {
                Some(scopes) => HostError::PermissionDenied(format!(
                    "{} [required scopes: {}]",
                    message, scopes
                )),
                None => HostError::PermissionDenied(message),
            },
            StatusCode::NOT_FOUND => HostError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => HostError::RateLimited,
            _ if status.is_server_error() => HostError::ApiError {
                status: status.as_u16(),
                message: format!("GitHub server error: {}", message),
            },
            _ => HostError::ApiError {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// GET every page of a listing endpoint.
    ///
    /// A response with status `empty_on` ends the listing early with the items
    /// gathered so far.
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        url: &str,
        empty_on: Option<StatusCode>,
    ) -> Result<Vec<T>, HostError> {
        let mut items = Vec::new();
        let mut page = 1usize;

        loop {
            let request = self.client.get(url).query(&[
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ]);
            let response = self.execute(request).await?;

            if Some(response.status()) == empty_on {
                return Ok(items);
            }

            let batch: Vec<T> = self.handle_response(response).await?;
            let fetched = batch.len();
            items.extend(batch);

            if fetched < PER_PAGE {
                return Ok(items);
            }
            page += 1;
        }
    }
}

#[async_trait]
impl GitHost for GitHubHost {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn repository_exists(&self, repo: &str) -> Result<bool, HostError> {
        match self.get_repository(repo).await {
            Ok(_) => Ok(true),
            Err(HostError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn get_repository(&self, repo: &str) -> Result<Repository, HostError> {
        let response = self.execute(self.client.get(self.repo_url(repo, ""))).await?;
        let repository: GitHubRepository = self.handle_response(response).await?;
        Ok(repository.into())
    }

    async fn list_refs(&self, repo: &str) -> Result<Vec<GitRef>, HostError> {
        let url = self.repo_url(repo, "git/refs");
        let refs: Vec<GitHubRef> = self.get_all_pages(&url, Some(StatusCode::CONFLICT)).await?;

        Ok(refs
            .into_iter()
            .filter_map(|r| match GitRef::try_from(r) {
                Ok(git_ref) => Some(git_ref),
                Err(e) => {
                    tracing::debug!(%repo, error = %e, "skipping unparseable ref");
                    None
                }
            })
            .collect())
    }

    async fn create_ref(&self, repo: &str, name: &RefName, sha: &Oid) -> Result<GitRef, HostError> {
        let body = CreateRefBody {
            ref_name: name.as_str(),
            sha: sha.as_str(),
        };
        let request = self.client.post(self.repo_url(repo, "git/refs")).json(&body);
        let response = self.execute(request).await?;
        let created: GitHubRef = self.handle_response(response).await?;
        created.try_into()
    }

    async fn update_ref(
        &self,
        repo: &str,
        name: &RefName,
        sha: &Oid,
        force: bool,
    ) -> Result<GitRef, HostError> {
        let url = self.repo_url(repo, &format!("git/refs/{}", name.api_path()));
        let body = UpdateRefBody {
            sha: sha.as_str(),
            force,
        };
        let response = self.execute(self.client.patch(&url).json(&body)).await?;

        if !response.status().is_success() {
            return Err(match self.error_from_response(response).await {
                HostError::ApiError { status, message } if status == 409 || status == 422 => {
                    if message.contains("does not exist") {
                        HostError::NotFound(message)
                    } else {
                        HostError::Conflict(message)
                    }
                }
                other => other,
            });
        }

        let updated: GitHubRef = self.handle_response(response).await?;
        updated.try_into()
    }

    async fn get_ref(&self, repo: &str, name: &RefName) -> Result<GitRef, HostError> {
        let url = self.repo_url(repo, &format!("git/ref/{}", name.api_path()));
        let response = self.execute(self.client.get(&url)).await?;
        let found: GitHubRef = self.handle_response(response).await?;
        found.try_into()
    }

    async fn get_commit(&self, repo: &str, sha: &Oid) -> Result<Commit, HostError> {
        let url = self.repo_url(repo, &format!("git/commits/{}", sha));
        let response = self.execute(self.client.get(&url)).await?;
        let commit: GitHubCommit = self.handle_response(response).await?;
        Ok(commit.into())
    }

    async fn create_blob(&self, repo: &str, blob: NewBlob) -> Result<Oid, HostError> {
        let body = CreateBlobBody {
            content: &blob.content,
            encoding: blob.encoding,
        };
        let request = self.client.post(self.repo_url(repo, "git/blobs")).json(&body);
        let response = self.execute(request).await?;
        let created: GitHubSha = self.handle_response(response).await?;
        Ok(created.sha)
    }

    async fn create_tree(
        &self,
        repo: &str,
        entries: Vec<TreeEntry>,
        base_tree: Option<&Oid>,
    ) -> Result<Oid, HostError> {
        let body = CreateTreeBody {
            base_tree: base_tree.map(|t| t.as_str()),
            tree: entries
                .iter()
                .map(|e| TreeEntryBody {
                    path: &e.path,
                    mode: e.mode,
                    kind: "blob",
                    sha: e.sha.as_str(),
                })
                .collect(),
        };
        let request = self.client.post(self.repo_url(repo, "git/trees")).json(&body);
        let response = self.execute(request).await?;
        let created: GitHubSha = self.handle_response(response).await?;
        Ok(created.sha)
    }

    async fn create_commit(&self, repo: &str, commit: NewCommit) -> Result<Commit, HostError> {
        let body = CreateCommitBody {
            message: &commit.message,
            tree: commit.tree.as_str(),
            parents: commit.parents.iter().map(|p| p.as_str()).collect(),
        };
        let request = self
            .client
            .post(self.repo_url(repo, "git/commits"))
            .json(&body);
        let response = self.execute(request).await?;
        let created: GitHubCommit = self.handle_response(response).await?;
        Ok(created.into())
    }

    async fn create_pull_request(
        &self,
        repo: &str,
        request: NewPullRequest,
    ) -> Result<PullRequest, HostError> {
        let body = CreatePrBody {
            title: &request.title,
            head: &request.head,
            base: &request.base,
            body: request.body.as_deref(),
        };
        let response = self
            .execute(self.client.post(self.repo_url(repo, "pulls")).json(&body))
            .await?;
        let pr: GitHubPullRequest = self.handle_response(response).await?;
        Ok(PullRequest {
            number: pr.number,
            url: pr.html_url,
        })
    }

    async fn get_file_content(&self, repo: &str, path: &str) -> Result<Option<Vec<u8>>, HostError> {
        let url = self.repo_url(repo, &format!("contents/{}", path.trim_start_matches('/')));
        let response = self.execute(self.client.get(&url)).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let file: GitHubContent = self.handle_response(response).await?;
        file.decode().map(Some)
    }

    async fn list_releases(&self, repo: &str) -> Result<Vec<Release>, HostError> {
        let url = self.repo_url(repo, "releases");
        self.get_all_pages(&url, None).await
    }

    async fn get_clone_stats(
        &self,
        repo: &str,
        period: TrafficPeriod,
    ) -> Result<TrafficStats, HostError> {
        let request = self
            .client
            .get(self.repo_url(repo, "traffic/clones"))
            .query(&[("per", period.to_string())]);
        let response = self.execute(request).await?;
        let clones: GitHubClones = self.handle_response(response).await?;
        Ok(TrafficStats {
            count: clones.count,
            uniques: clones.uniques,
            samples: clones.clones,
        })
    }

    async fn get_view_stats(
        &self,
        repo: &str,
        period: TrafficPeriod,
    ) -> Result<TrafficStats, HostError> {
        let request = self
            .client
            .get(self.repo_url(repo, "traffic/views"))
            .query(&[("per", period.to_string())]);
        let response = self.execute(request).await?;
        let views: GitHubViews = self.handle_response(response).await?;
        Ok(TrafficStats {
            count: views.count,
            uniques: views.uniques,
            samples: views.views,
        })
    }
}

// --------------------------------------------------------------------------
// Request bodies
// --------------------------------------------------------------------------

#[derive(Serialize)]
struct CreateRefBody<'a> {
    #[serde(rename = "ref")]
    ref_name: &'a str,
    sha: &'a str,
}

#[derive(Serialize)]
struct UpdateRefBody<'a> {
    sha: &'a str,
    force: bool,
}

#[derive(Serialize)]
struct CreateBlobBody<'a> {
    content: &'a str,
    encoding: BlobEncoding,
}

#[derive(Serialize)]
struct CreateTreeBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    base_tree: Option<&'a str>,
    tree: Vec<TreeEntryBody<'a>>,
}

#[derive(Serialize)]
struct TreeEntryBody<'a> {
    path: &'a str,
    mode: FileMode,
    #[serde(rename = "type")]
    kind: &'a str,
    sha: &'a str,
}

#[derive(Serialize)]
struct CreateCommitBody<'a> {
    message: &'a str,
    tree: &'a str,
    parents: Vec<&'a str>,
}

#[derive(Serialize)]
struct CreatePrBody<'a> {
    title: &'a str,
    head: &'a str,
    base: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
}

// --------------------------------------------------------------------------
// Response formats
// --------------------------------------------------------------------------

/// GitHub error response format.
#[derive(Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

#[derive(Deserialize)]
struct GitHubOwner {
    login: String,
}

#[derive(Deserialize)]
struct GitHubParent {
    full_name: String,
}

#[derive(Deserialize)]
struct GitHubRepository {
    full_name: String,
    name: String,
    owner: GitHubOwner,
    description: Option<String>,
    html_url: String,
    fork: bool,
    parent: Option<GitHubParent>,
}

impl From<GitHubRepository> for Repository {
    fn from(gh: GitHubRepository) -> Self {
        Repository {
            full_name: gh.full_name,
            name: gh.name,
            owner: gh.owner.login,
            description: gh.description,
            html_url: gh.html_url,
            fork: gh.fork,
            parent: gh.parent.map(|p| p.full_name),
        }
    }
}

#[derive(Deserialize)]
struct GitHubObject {
    sha: String,
}

#[derive(Deserialize)]
struct GitHubRef {
    #[serde(rename = "ref")]
    ref_name: String,
    object: GitHubObject,
}

impl TryFrom<GitHubRef> for GitRef {
    type Error = HostError;

    fn try_from(gh: GitHubRef) -> Result<Self, Self::Error> {
        let invalid = |e: crate::core::types::TypeError| HostError::ApiError {
            status: 200,
            message: format!("invalid ref in response: {}", e),
        };
        Ok(GitRef {
            name: RefName::new(gh.ref_name).map_err(invalid)?,
            sha: Oid::new(gh.object.sha).map_err(invalid)?,
        })
    }
}

#[derive(Deserialize)]
struct GitHubSha {
    sha: Oid,
}

#[derive(Deserialize)]
struct GitHubCommit {
    sha: Oid,
    tree: GitHubSha,
    #[serde(default)]
    parents: Vec<GitHubSha>,
    message: String,
}

impl From<GitHubCommit> for Commit {
    fn from(gh: GitHubCommit) -> Self {
        Commit {
            sha: gh.sha,
            tree: gh.tree.sha,
            parents: gh.parents.into_iter().map(|p| p.sha).collect(),
            message: gh.message,
        }
    }
}

#[derive(Deserialize)]
struct GitHubPullRequest {
    number: u64,
    html_url: String,
}

#[derive(Deserialize)]
struct GitHubContent {
    content: String,
    encoding: String,
}

impl GitHubContent {
    /// Decode the payload. GitHub wraps base64 content at 60 columns.
    fn decode(self) -> Result<Vec<u8>, HostError> {
        match self.encoding.as_str() {
            "base64" => {
                let compact: String = self
                    .content
                    .chars()
                    .filter(|c| !c.is_ascii_whitespace())
                    .collect();
                base64::engine::general_purpose::STANDARD
                    .decode(compact)
                    .map_err(|e| HostError::ApiError {
                        status: 200,
                        message: format!("invalid base64 content: {}", e),
                    })
            }
            _ => Ok(self.content.into_bytes()),
        }
    }
}

#[derive(Deserialize)]
struct GitHubClones {
    count: u64,
    uniques: u64,
    #[serde(default)]
    clones: Vec<TrafficSample>,
}

#[derive(Deserialize)]
struct GitHubViews {
    count: u64,
    uniques: u64,
    #[serde(default)]
    views: Vec<TrafficSample>,
}
