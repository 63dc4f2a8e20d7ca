//! host::mock
//!
//! In-memory [`GitHost`] for deterministic testing.
//!
//! # Design
//!
//! Each registered repository owns a ref table, a content-addressed object
//! store (blobs, trees, commits), a set of files served by
//! `get_file_content`, releases and traffic numbers. Object ids are SHA-256
//! digests of the object payload, so creating the same object twice yields the
//! same id.
//!
//! Every call is recorded as a [`MockOperation`] before any injected failure
//! is checked, so tests can assert exact call sequences.
//!
//! Failures are injected with [`MockHost::fail_on`] (every call) or
//! [`MockHost::fail_on_times`] (the next `n` calls). A concurrent writer is
//! simulated with [`MockHost::move_ref_on_failure`]: queued ref moves are
//! applied the moment an injected failure fires.
//!
//! # Example
//!
//! ```
//! use pluginsync::host::mock::MockHost;
//! use pluginsync::host::{GitHost, Repository};
//! use pluginsync::core::types::RefName;
//!
//! # tokio_test::block_on(async {
//! let host = MockHost::new().with_repository(Repository::new("acme/widget"));
//! let head = host.seed_branch("acme/widget", "master", &[("README.md", "hi")]);
//!
//! let refs = host.list_refs("acme/widget").await.unwrap();
//! assert_eq!(refs.len(), 1);
//! assert_eq!(refs[0].name, RefName::new("refs/heads/master").unwrap());
//! assert_eq!(refs[0].sha, head);
//! # });
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use base64::Engine as _;
use sha2::{Digest, Sha256};

use super::traits::{
    BlobEncoding, Commit, FileMode, GitHost, GitRef, HostError, NewBlob, NewCommit,
    NewPullRequest, PullRequest, Release, Repository, TrafficPeriod, TrafficStats, TreeEntry,
};
use crate::core::types::{BranchName, Oid, RefName};

/// Mock host for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone)]
pub struct MockHost {
    inner: Arc<Mutex<MockHostInner>>,
}

#[derive(Debug, Default)]
struct MockHostInner {
    repos: HashMap<String, MockRepo>,
    failures: Vec<ScriptedFailure>,
    pending_moves: Vec<RefMove>,
    operations: Vec<MockOperation>,
    next_pr_number: u64,
}

#[derive(Debug)]
struct MockRepo {
    info: Repository,
    refs: BTreeMap<RefName, Oid>,
    objects: HashMap<Oid, MockObject>,
    files: HashMap<String, Vec<u8>>,
    releases: Vec<Release>,
    clones: TrafficStats,
    views: TrafficStats,
}

#[derive(Debug, Clone)]
enum MockObject {
    Blob(Vec<u8>),
    Tree(BTreeMap<String, (FileMode, Oid)>),
    Commit(Commit),
}

#[derive(Debug)]
struct ScriptedFailure {
    on: FailOn,
    /// Remaining firings; `None` fails forever
    remaining: Option<usize>,
}

#[derive(Debug, Clone)]
struct RefMove {
    repo: String,
    name: RefName,
    sha: Oid,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    GetRepository(HostError),
    ListRefs(HostError),
    CreateRef(HostError),
    UpdateRef(HostError),
    GetRef(HostError),
    GetCommit(HostError),
    CreateBlob(HostError),
    CreateTree(HostError),
    CreateCommit(HostError),
    CreatePullRequest(HostError),
    GetFileContent(HostError),
    ListReleases(HostError),
    CloneStats(HostError),
    ViewStats(HostError),
}

impl FailOn {
    fn operation(&self) -> &'static str {
        match self {
            FailOn::GetRepository(_) => "get_repository",
            FailOn::ListRefs(_) => "list_refs",
            FailOn::CreateRef(_) => "create_ref",
            FailOn::UpdateRef(_) => "update_ref",
            FailOn::GetRef(_) => "get_ref",
            FailOn::GetCommit(_) => "get_commit",
            FailOn::CreateBlob(_) => "create_blob",
            FailOn::CreateTree(_) => "create_tree",
            FailOn::CreateCommit(_) => "create_commit",
            FailOn::CreatePullRequest(_) => "create_pull_request",
            FailOn::GetFileContent(_) => "get_file_content",
            FailOn::ListReleases(_) => "list_releases",
            FailOn::CloneStats(_) => "get_clone_stats",
            FailOn::ViewStats(_) => "get_view_stats",
        }
    }

    fn error(&self) -> HostError {
        match self {
            FailOn::GetRepository(e)
            | FailOn::ListRefs(e)
            | FailOn::CreateRef(e)
            | FailOn::UpdateRef(e)
            | FailOn::GetRef(e)
            | FailOn::GetCommit(e)
            | FailOn::CreateBlob(e)
            | FailOn::CreateTree(e)
            | FailOn::CreateCommit(e)
            | FailOn::CreatePullRequest(e)
            | FailOn::GetFileContent(e)
            | FailOn::ListReleases(e)
            | FailOn::CloneStats(e)
            | FailOn::ViewStats(e) => e.clone(),
        }
    }
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    RepositoryExists {
        repo: String,
    },
    GetRepository {
        repo: String,
    },
    ListRefs {
        repo: String,
    },
    CreateRef {
        repo: String,
        name: RefName,
        sha: Oid,
    },
    UpdateRef {
        repo: String,
        name: RefName,
        sha: Oid,
        force: bool,
    },
    GetRef {
        repo: String,
        name: RefName,
    },
    GetCommit {
        repo: String,
        sha: Oid,
    },
    CreateBlob {
        repo: String,
        encoding: BlobEncoding,
    },
    CreateTree {
        repo: String,
        paths: Vec<String>,
        base_tree: Option<Oid>,
    },
    CreateCommit {
        repo: String,
        message: String,
        tree: Oid,
        parents: Vec<Oid>,
    },
    CreatePullRequest {
        repo: String,
        base: String,
        head: String,
        title: String,
    },
    GetFileContent {
        repo: String,
        path: String,
    },
    ListReleases {
        repo: String,
    },
    GetCloneStats {
        repo: String,
        period: TrafficPeriod,
    },
    GetViewStats {
        repo: String,
        period: TrafficPeriod,
    },
}

impl MockOperation {
    /// Whether the operation mutates host state.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            MockOperation::CreateRef { .. }
                | MockOperation::UpdateRef { .. }
                | MockOperation::CreateBlob { .. }
                | MockOperation::CreateTree { .. }
                | MockOperation::CreateCommit { .. }
                | MockOperation::CreatePullRequest { .. }
        )
    }
}

/// Content-derived object id.
fn object_id(kind: &str, payload: &[u8]) -> Oid {
    let mut hasher = Sha256::new();
    hasher.update(format!("{} {}\0", kind, payload.len()).as_bytes());
    hasher.update(payload);
    // A hex SHA-256 digest is always a valid 64-char object id.
    Oid::new(hex::encode(hasher.finalize())).unwrap_or_else(|_| unreachable!())
}

fn tree_id(entries: &BTreeMap<String, (FileMode, Oid)>) -> Oid {
    let payload: String = entries
        .iter()
        .map(|(path, (mode, sha))| {
            let mode = match mode {
                FileMode::File => "100644",
                FileMode::Executable => "100755",
            };
            format!("{} {} {}\n", mode, path, sha)
        })
        .collect();
    object_id("tree", payload.as_bytes())
}

fn commit_id(tree: &Oid, parents: &[Oid], message: &str) -> Oid {
    let mut payload = format!("tree {}\n", tree);
    for parent in parents {
        payload.push_str(&format!("parent {}\n", parent));
    }
    payload.push('\n');
    payload.push_str(message);
    object_id("commit", payload.as_bytes())
}

impl MockRepo {
    fn new(info: Repository) -> Self {
        Self {
            info,
            refs: BTreeMap::new(),
            objects: HashMap::new(),
            files: HashMap::new(),
            releases: Vec::new(),
            clones: TrafficStats::default(),
            views: TrafficStats::default(),
        }
    }

    fn store_blob(&mut self, bytes: Vec<u8>) -> Oid {
        let sha = object_id("blob", &bytes);
        self.objects.insert(sha.clone(), MockObject::Blob(bytes));
        sha
    }

    fn store_tree(&mut self, entries: BTreeMap<String, (FileMode, Oid)>) -> Oid {
        let sha = tree_id(&entries);
        self.objects.insert(sha.clone(), MockObject::Tree(entries));
        sha
    }

    fn store_commit(&mut self, tree: Oid, parents: Vec<Oid>, message: String) -> Commit {
        let commit = Commit {
            sha: commit_id(&tree, &parents, &message),
            tree,
            parents,
            message,
        };
        self.objects
            .insert(commit.sha.clone(), MockObject::Commit(commit.clone()));
        commit
    }

    fn commit(&self, sha: &Oid) -> Option<&Commit> {
        match self.objects.get(sha) {
            Some(MockObject::Commit(c)) => Some(c),
            _ => None,
        }
    }

    /// Whether `ancestor` is reachable from `descendant` through known commits.
    fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> bool {
        let mut stack = vec![descendant.clone()];
        while let Some(sha) = stack.pop() {
            if &sha == ancestor {
                return true;
            }
            if let Some(commit) = self.commit(&sha) {
                stack.extend(commit.parents.iter().cloned());
            }
        }
        false
    }
}

impl MockHost {
    /// Create a new empty mock host.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockHostInner {
                next_pr_number: 1,
                ..Default::default()
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockHostInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a repository.
    pub fn with_repository(self, repo: Repository) -> Self {
        self.add_repository(repo);
        self
    }

    /// Register a repository on a shared handle.
    pub fn add_repository(&self, repo: Repository) {
        let mut inner = self.state();
        inner
            .repos
            .insert(repo.full_name.clone(), MockRepo::new(repo));
    }

    /// Point a ref at an arbitrary id without creating objects.
    ///
    /// # Panics
    ///
    /// Panics if the repository is not registered or the names are invalid.
    pub fn set_ref(&self, repo: &str, name: &str, sha: &str) {
        let name = RefName::new(name).expect("valid ref name");
        let sha = Oid::new(sha).expect("valid object id");
        let mut inner = self.state();
        inner
            .repos
            .get_mut(repo)
            .expect("repository registered")
            .refs
            .insert(name, sha);
    }

    /// Create a root commit holding `files` and point `branch` at it.
    ///
    /// Nothing is recorded as an operation.
    ///
    /// # Panics
    ///
    /// Panics if the repository is not registered or the branch name is invalid.
    pub fn seed_branch(&self, repo: &str, branch: &str, files: &[(&str, &str)]) -> Oid {
        let branch = BranchName::new(branch).expect("valid branch name");
        let mut inner = self.state();
        let state = inner.repos.get_mut(repo).expect("repository registered");

        let mut entries = BTreeMap::new();
        for (path, contents) in files {
            let blob = state.store_blob(contents.as_bytes().to_vec());
            entries.insert(path.to_string(), (FileMode::File, blob));
        }
        let tree = state.store_tree(entries);
        let commit = state.store_commit(tree, Vec::new(), format!("seed {}", branch));
        state
            .refs
            .insert(RefName::for_branch(&branch), commit.sha.clone());
        commit.sha
    }

    /// Serve `bytes` for `path` from `get_file_content`.
    pub fn put_file(&self, repo: &str, path: &str, bytes: impl Into<Vec<u8>>) {
        let mut inner = self.state();
        if let Some(state) = inner.repos.get_mut(repo) {
            state.files.insert(path.to_string(), bytes.into());
        }
    }

    /// Add a release (listed newest first in insertion order).
    pub fn add_release(&self, repo: &str, release: Release) {
        let mut inner = self.state();
        if let Some(state) = inner.repos.get_mut(repo) {
            state.releases.push(release);
        }
    }

    /// Set clone and view traffic.
    pub fn set_traffic(&self, repo: &str, clones: TrafficStats, views: TrafficStats) {
        let mut inner = self.state();
        if let Some(state) = inner.repos.get_mut(repo) {
            state.clones = clones;
            state.views = views;
        }
    }

    /// Fail every call of an operation.
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.state().failures.push(ScriptedFailure {
            on: fail_on,
            remaining: None,
        });
        self
    }

    /// Fail the next `times` calls of an operation.
    pub fn fail_on_times(self, fail_on: FailOn, times: usize) -> Self {
        self.state().failures.push(ScriptedFailure {
            on: fail_on,
            remaining: Some(times),
        });
        self
    }

    /// Clear all failure configuration.
    pub fn clear_fail_on(&self) {
        self.state().failures.clear();
    }

    /// Queue a ref move applied when the next injected failure fires.
    ///
    /// # Panics
    ///
    /// Panics if the names are invalid.
    pub fn move_ref_on_failure(self, repo: &str, name: &str, sha: &str) -> Self {
        self.state().pending_moves.push(RefMove {
            repo: repo.to_string(),
            name: RefName::new(name).expect("valid ref name"),
            sha: Oid::new(sha).expect("valid object id"),
        });
        self
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.state().operations.clone()
    }

    /// Number of recorded operations that mutate host state.
    pub fn write_count(&self) -> usize {
        self.state()
            .operations
            .iter()
            .filter(|op| op.is_write())
            .count()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        self.state().operations.clear();
    }

    /// Current target of a ref (for test verification).
    pub fn ref_sha(&self, repo: &str, name: &str) -> Option<Oid> {
        let name = RefName::new(name).ok()?;
        self.state().repos.get(repo)?.refs.get(&name).cloned()
    }

    /// Content of `path` in the tree of `commit` (for test verification).
    pub fn file_at(&self, repo: &str, commit: &Oid, path: &str) -> Option<Vec<u8>> {
        let inner = self.state();
        let state = inner.repos.get(repo)?;
        let tree = match state.objects.get(&state.commit(commit)?.tree)? {
            MockObject::Tree(entries) => entries,
            _ => return None,
        };
        match state.objects.get(&tree.get(path)?.1)? {
            MockObject::Blob(bytes) => Some(bytes.clone()),
            _ => None,
        }
    }

    /// Fetch a commit object (for test verification).
    pub fn commit(&self, repo: &str, sha: &Oid) -> Option<Commit> {
        self.state().repos.get(repo)?.commit(sha).cloned()
    }

    fn record(&self, op: MockOperation) {
        self.state().operations.push(op);
    }

    /// Fire an injected failure for `operation`, applying queued ref moves.
    fn check_fail(&self, operation: &str) -> Result<(), HostError> {
        let mut inner = self.state();
        let Some(index) = inner
            .failures
            .iter()
            .position(|f| f.on.operation() == operation && f.remaining != Some(0))
        else {
            return Ok(());
        };

        let failure = &mut inner.failures[index];
        if let Some(remaining) = failure.remaining.as_mut() {
            *remaining -= 1;
        }
        let error = failure.on.error();

        let moves: Vec<RefMove> = inner.pending_moves.drain(..).collect();
        for m in moves {
            if let Some(state) = inner.repos.get_mut(&m.repo) {
                state.refs.insert(m.name, m.sha);
            }
        }

        Err(error)
    }

    /// Run `f` against a registered repository.
    fn with_repo<T>(
        &self,
        repo: &str,
        f: impl FnOnce(&mut MockRepo) -> Result<T, HostError>,
    ) -> Result<T, HostError> {
        let mut inner = self.state();
        let state = inner
            .repos
            .get_mut(repo)
            .ok_or_else(|| HostError::NotFound(format!("repository {}", repo)))?;
        f(state)
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

fn validation_error(message: String) -> HostError {
    HostError::ApiError {
        status: 422,
        message,
    }
}

#[async_trait]
impl GitHost for MockHost {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn repository_exists(&self, repo: &str) -> Result<bool, HostError> {
        self.record(MockOperation::RepositoryExists {
            repo: repo.to_string(),
        });
        self.check_fail("get_repository")?;
        Ok(self.state().repos.contains_key(repo))
    }

    async fn get_repository(&self, repo: &str) -> Result<Repository, HostError> {
        self.record(MockOperation::GetRepository {
            repo: repo.to_string(),
        });
        self.check_fail("get_repository")?;
        self.with_repo(repo, |state| Ok(state.info.clone()))
    }

    async fn list_refs(&self, repo: &str) -> Result<Vec<GitRef>, HostError> {
        self.record(MockOperation::ListRefs {
            repo: repo.to_string(),
        });
        self.check_fail("list_refs")?;
        self.with_repo(repo, |state| {
            Ok(state
                .refs
                .iter()
                .map(|(name, sha)| GitRef {
                    name: name.clone(),
                    sha: sha.clone(),
                })
                .collect())
        })
    }

    async fn create_ref(&self, repo: &str, name: &RefName, sha: &Oid) -> Result<GitRef, HostError> {
        self.record(MockOperation::CreateRef {
            repo: repo.to_string(),
            name: name.clone(),
            sha: sha.clone(),
        });
        self.check_fail("create_ref")?;
        self.with_repo(repo, |state| {
            if state.refs.contains_key(name) {
                return Err(validation_error("Reference already exists".into()));
            }
            state.refs.insert(name.clone(), sha.clone());
            Ok(GitRef {
                name: name.clone(),
                sha: sha.clone(),
            })
        })
    }

    async fn update_ref(
        &self,
        repo: &str,
        name: &RefName,
        sha: &Oid,
        force: bool,
    ) -> Result<GitRef, HostError> {
        self.record(MockOperation::UpdateRef {
            repo: repo.to_string(),
            name: name.clone(),
            sha: sha.clone(),
            force,
        });
        self.check_fail("update_ref")?;
        self.with_repo(repo, |state| {
            let current = state
                .refs
                .get(name)
                .cloned()
                .ok_or_else(|| HostError::NotFound(format!("Reference does not exist: {}", name)))?;

            let both_known = state.commit(&current).is_some() && state.commit(sha).is_some();
            if !force && both_known && !state.is_ancestor(&current, sha) {
                return Err(HostError::Conflict("Update is not a fast forward".into()));
            }

            state.refs.insert(name.clone(), sha.clone());
            Ok(GitRef {
                name: name.clone(),
                sha: sha.clone(),
            })
        })
    }

    async fn get_ref(&self, repo: &str, name: &RefName) -> Result<GitRef, HostError> {
        self.record(MockOperation::GetRef {
            repo: repo.to_string(),
            name: name.clone(),
        });
        self.check_fail("get_ref")?;
        self.with_repo(repo, |state| {
            let sha = state
                .refs
                .get(name)
                .cloned()
                .ok_or_else(|| HostError::NotFound(format!("ref {}", name)))?;
            Ok(GitRef {
                name: name.clone(),
                sha,
            })
        })
    }

    async fn get_commit(&self, repo: &str, sha: &Oid) -> Result<Commit, HostError> {
        self.record(MockOperation::GetCommit {
            repo: repo.to_string(),
            sha: sha.clone(),
        });
        self.check_fail("get_commit")?;
        self.with_repo(repo, |state| {
            state
                .commit(sha)
                .cloned()
                .ok_or_else(|| HostError::NotFound(format!("commit {}", sha)))
        })
    }

    async fn create_blob(&self, repo: &str, blob: NewBlob) -> Result<Oid, HostError> {
        self.record(MockOperation::CreateBlob {
            repo: repo.to_string(),
            encoding: blob.encoding,
        });
        self.check_fail("create_blob")?;
        let bytes = match blob.encoding {
            BlobEncoding::Utf8 => blob.content.into_bytes(),
            BlobEncoding::Base64 => base64::engine::general_purpose::STANDARD
                .decode(blob.content.as_bytes())
                .map_err(|e| validation_error(format!("invalid base64 content: {}", e)))?,
        };
        self.with_repo(repo, |state| Ok(state.store_blob(bytes)))
    }

    async fn create_tree(
        &self,
        repo: &str,
        entries: Vec<TreeEntry>,
        base_tree: Option<&Oid>,
    ) -> Result<Oid, HostError> {
        self.record(MockOperation::CreateTree {
            repo: repo.to_string(),
            paths: entries.iter().map(|e| e.path.clone()).collect(),
            base_tree: base_tree.cloned(),
        });
        self.check_fail("create_tree")?;
        self.with_repo(repo, |state| {
            let mut tree = match base_tree {
                Some(base) => match state.objects.get(base) {
                    Some(MockObject::Tree(existing)) => existing.clone(),
                    _ => return Err(validation_error(format!("base_tree {} is not a tree", base))),
                },
                None => BTreeMap::new(),
            };
            for entry in entries {
                if !matches!(state.objects.get(&entry.sha), Some(MockObject::Blob(_))) {
                    return Err(validation_error(format!(
                        "tree.sha {} is not a valid blob",
                        entry.sha
                    )));
                }
                tree.insert(entry.path, (entry.mode, entry.sha));
            }
            Ok(state.store_tree(tree))
        })
    }

    async fn create_commit(&self, repo: &str, commit: NewCommit) -> Result<Commit, HostError> {
        self.record(MockOperation::CreateCommit {
            repo: repo.to_string(),
            message: commit.message.clone(),
            tree: commit.tree.clone(),
            parents: commit.parents.clone(),
        });
        self.check_fail("create_commit")?;
        self.with_repo(repo, |state| {
            if !matches!(state.objects.get(&commit.tree), Some(MockObject::Tree(_))) {
                return Err(validation_error(format!("tree {} does not exist", commit.tree)));
            }
            if let Some(missing) = commit.parents.iter().find(|p| state.commit(p).is_none()) {
                return Err(validation_error(format!("parent {} does not exist", missing)));
            }
            Ok(state.store_commit(commit.tree, commit.parents, commit.message))
        })
    }

    async fn create_pull_request(
        &self,
        repo: &str,
        request: NewPullRequest,
    ) -> Result<PullRequest, HostError> {
        self.record(MockOperation::CreatePullRequest {
            repo: repo.to_string(),
            base: request.base.clone(),
            head: request.head.clone(),
            title: request.title.clone(),
        });
        self.check_fail("create_pull_request")?;
        self.with_repo(repo, |_| Ok(()))?;

        let mut inner = self.state();
        let number = inner.next_pr_number;
        inner.next_pr_number += 1;
        Ok(PullRequest {
            number,
            url: format!("https://github.com/{}/pull/{}", repo, number),
        })
    }

    async fn get_file_content(&self, repo: &str, path: &str) -> Result<Option<Vec<u8>>, HostError> {
        self.record(MockOperation::GetFileContent {
            repo: repo.to_string(),
            path: path.to_string(),
        });
        self.check_fail("get_file_content")?;
        self.with_repo(repo, |state| Ok(state.files.get(path).cloned()))
    }

    async fn list_releases(&self, repo: &str) -> Result<Vec<Release>, HostError> {
        self.record(MockOperation::ListReleases {
            repo: repo.to_string(),
        });
        self.check_fail("list_releases")?;
        self.with_repo(repo, |state| Ok(state.releases.clone()))
    }

    async fn get_clone_stats(
        &self,
        repo: &str,
        period: TrafficPeriod,
    ) -> Result<TrafficStats, HostError> {
        self.record(MockOperation::GetCloneStats {
            repo: repo.to_string(),
            period,
        });
        self.check_fail("get_clone_stats")?;
        self.with_repo(repo, |state| Ok(state.clones.clone()))
    }

    async fn get_view_stats(
        &self,
        repo: &str,
        period: TrafficPeriod,
    ) -> Result<TrafficStats, HostError> {
        self.record(MockOperation::GetViewStats {
            repo: repo.to_string(),
            period,
        });
        self.check_fail("get_view_stats")?;
        self.with_repo(repo, |state| Ok(state.views.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPO: &str = "acme/snap-plugin-collector-cpu";

    fn host() -> MockHost {
        MockHost::new().with_repository(Repository::new(REPO))
    }

    fn sha(c: char) -> String {
        c.to_string().repeat(40)
    }

    #[tokio::test]
    async fn unknown_repository_not_found() {
        let host = MockHost::new();
        assert!(!host.repository_exists("nobody/nothing").await.unwrap());
        assert!(matches!(
            host.list_refs("nobody/nothing").await,
            Err(HostError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn create_ref_rejects_existing() {
        let host = host();
        host.set_ref(REPO, "refs/heads/master", &sha('a'));

        let name = RefName::new("refs/heads/master").unwrap();
        let result = host
            .create_ref(REPO, &name, &Oid::new(sha('b')).unwrap())
            .await;
        assert!(matches!(result, Err(HostError::ApiError { status: 422, .. })));
    }

    #[tokio::test]
    async fn update_missing_ref_not_found() {
        let host = host();
        let name = RefName::new("refs/heads/nope").unwrap();
        let result = host
            .update_ref(REPO, &name, &Oid::new(sha('b')).unwrap(), false)
            .await;
        assert!(matches!(result, Err(HostError::NotFound(_))));
    }

    #[tokio::test]
    async fn blobs_are_content_addressed() {
        let host = host();
        let a = host.create_blob(REPO, NewBlob::base64(b"same")).await.unwrap();
        let b = host.create_blob(REPO, NewBlob::base64(b"same")).await.unwrap();
        let c = host.create_blob(REPO, NewBlob::base64(b"other")).await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn create_tree_requires_blob() {
        let host = host();
        let result = host
            .create_tree(
                REPO,
                vec![TreeEntry {
                    path: "x".into(),
                    mode: FileMode::File,
                    sha: Oid::new(sha('c')).unwrap(),
                }],
                None,
            )
            .await;
        assert!(matches!(result, Err(HostError::ApiError { status: 422, .. })));
    }

    #[tokio::test]
    async fn non_fast_forward_update_conflicts() {
        let host = host();
        let head = host.seed_branch(REPO, "master", &[("a", "1")]);
        let other = host.seed_branch(REPO, "other", &[("b", "2")]);

        let name = RefName::new("refs/heads/master").unwrap();
        let result = host.update_ref(REPO, &name, &other, false).await;
        assert!(matches!(result, Err(HostError::Conflict(_))));
        assert_eq!(host.ref_sha(REPO, "refs/heads/master"), Some(head));

        host.update_ref(REPO, &name, &other, true).await.unwrap();
        assert_eq!(host.ref_sha(REPO, "refs/heads/master"), Some(other));
    }

    #[tokio::test]
    async fn fail_on_times_then_recovers() {
        let host = host().fail_on_times(FailOn::ListRefs(HostError::RateLimited), 1);
        assert!(matches!(
            host.list_refs(REPO).await,
            Err(HostError::RateLimited)
        ));
        assert!(host.list_refs(REPO).await.is_ok());
    }

    #[tokio::test]
    async fn fail_on_is_persistent() {
        let host = host().fail_on(FailOn::ListReleases(HostError::RateLimited));
        assert!(host.list_releases(REPO).await.is_err());
        assert!(host.list_releases(REPO).await.is_err());
        host.clear_fail_on();
        assert!(host.list_releases(REPO).await.is_ok());
    }

    #[tokio::test]
    async fn ref_moves_applied_on_failure() {
        let host = host()
            .fail_on_times(FailOn::UpdateRef(HostError::Conflict("moved".into())), 1)
            .move_ref_on_failure(REPO, "refs/heads/master", &sha('e'));
        host.set_ref(REPO, "refs/heads/master", &sha('a'));

        let name = RefName::new("refs/heads/master").unwrap();
        let _ = host
            .update_ref(REPO, &name, &Oid::new(sha('b')).unwrap(), false)
            .await;
        assert_eq!(
            host.ref_sha(REPO, "refs/heads/master"),
            Some(Oid::new(sha('e')).unwrap())
        );
    }

    #[tokio::test]
    async fn operations_recorded_and_writes_counted() {
        let host = host();
        host.list_refs(REPO).await.unwrap();
        host.create_blob(REPO, NewBlob::base64(b"x")).await.unwrap();

        let ops = host.operations();
        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[0], MockOperation::ListRefs { .. }));
        assert_eq!(host.write_count(), 1);

        host.clear_operations();
        assert!(host.operations().is_empty());
    }

    #[tokio::test]
    async fn pull_requests_numbered_sequentially() {
        let host = host();
        let request = NewPullRequest {
            base: "master".into(),
            head: "me:pluginsync".into(),
            title: "sync".into(),
            body: None,
        };
        let first = host.create_pull_request(REPO, request.clone()).await.unwrap();
        let second = host.create_pull_request(REPO, request).await.unwrap();
        assert_eq!(first.number, 1);
        assert_eq!(second.number, 2);
    }

    #[test]
    fn host_name() {
        assert_eq!(MockHost::new().name(), "mock");
    }
}
