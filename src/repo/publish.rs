//! repo::publish
//!
//! Publishing a file into a branch through the host's git object API.
//!
//! The pipeline runs six dependent steps in order: read the branch head,
//! read its tree, create a blob, create a tree on top of the old one, create
//! a commit, move the branch. There is no rollback. If the final ref update
//! fails, the blob, tree and commit stay behind unreferenced; they are
//! content-addressed and harmless.

use std::sync::Arc;

use serde::Serialize;

use super::RepoError;
use crate::core::types::{BranchName, Oid, RefName};
use crate::host::{FileMode, GitHost, NewBlob, NewCommit, Repository, TreeEntry};

/// Branch that never receives direct commits.
pub const PROTECTED_BRANCH: &str = "master";

/// Objects created by a successful publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishReceipt {
    pub blob: Oid,
    pub tree: Oid,
    pub commit: Oid,
}

/// Commits a content buffer to a path on a branch.
#[derive(Clone)]
pub struct ContentCommitPipeline {
    host: Arc<dyn GitHost>,
    org: String,
    tool_name: String,
}

impl ContentCommitPipeline {
    /// Create a pipeline that refuses repositories owned by `org` and signs
    /// commit messages with `tool_name`.
    pub fn new(
        host: Arc<dyn GitHost>,
        org: impl Into<String>,
        tool_name: impl Into<String>,
    ) -> Self {
        Self {
            host,
            org: org.into(),
            tool_name: tool_name.into(),
        }
    }

    /// Commit message for an update of `path`.
    pub fn commit_message(&self, path: &str) -> String {
        format!("update {} by {}", path, self.tool_name)
    }

    /// Reject targets that must never be committed to directly.
    ///
    /// Runs before any host call.
    pub fn check_policy(&self, repo: &Repository, branch: &BranchName) -> Result<(), RepoError> {
        if repo.owner.eq_ignore_ascii_case(&self.org) {
            return Err(RepoError::Policy(format!(
                "refusing to commit to {}: repositories owned by {} only change through pull requests",
                repo.full_name, self.org
            )));
        }
        if branch.as_str() == PROTECTED_BRANCH {
            return Err(RepoError::Policy(format!(
                "refusing to commit to {} on {}: the default branch is protected",
                repo.full_name, PROTECTED_BRANCH
            )));
        }
        Ok(())
    }

    /// Write `content` to `path` on `branch` of `repo`.
    ///
    /// # Errors
    ///
    /// - `RepoError::Policy` for organization repositories or the protected
    ///   branch, before any host call
    /// - `RepoError::Host(HostError::Conflict)` if the branch moved before
    ///   the final ref update
    /// - any other host error from the failing step
    pub async fn publish(
        &self,
        repo: &Repository,
        path: &str,
        content: &[u8],
        branch: &BranchName,
    ) -> Result<PublishReceipt, RepoError> {
        self.check_policy(repo, branch)?;

        let name = repo.full_name.as_str();
        let branch_ref = RefName::for_branch(branch);

        let latest = self.host.get_ref(name, &branch_ref).await?.sha;
        tracing::debug!(repo = name, branch = %branch, sha = %latest, "resolved branch head");

        let base_tree = self.host.get_commit(name, &latest).await?.tree;
        tracing::debug!(repo = name, tree = %base_tree, "resolved base tree");

        let blob = self.host.create_blob(name, NewBlob::base64(content)).await?;
        tracing::debug!(repo = name, path, blob = %blob, bytes = content.len(), "created blob");

        let tree = self
            .host
            .create_tree(
                name,
                vec![TreeEntry {
                    path: path.to_string(),
                    mode: FileMode::File,
                    sha: blob.clone(),
                }],
                Some(&base_tree),
            )
            .await?;
        tracing::debug!(repo = name, tree = %tree, "created tree");

        let commit = self
            .host
            .create_commit(
                name,
                NewCommit {
                    message: self.commit_message(path),
                    tree: tree.clone(),
                    parents: vec![latest],
                },
            )
            .await?;
        tracing::debug!(repo = name, commit = %commit.sha, "created commit");

        self.host
            .update_ref(name, &branch_ref, &commit.sha, false)
            .await?;
        tracing::info!(repo = name, branch = %branch, path, sha = %commit.sha, "published content");

        Ok(PublishReceipt {
            blob,
            tree,
            commit: commit.sha,
        })
    }
}

impl std::fmt::Debug for ContentCommitPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentCommitPipeline")
            .field("host", &self.host.name())
            .field("org", &self.org)
            .field("tool_name", &self.tool_name)
            .finish()
    }
}
