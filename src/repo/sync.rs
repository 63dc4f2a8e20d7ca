//! repo::sync
//!
//! Fork branch synchronization.
//!
//! # State Machine
//!
//! ```text
//!            resolve origin, resolve fork
//!                      |
//!        +-------------+--------------+
//!        |             |              |
//!     Missing        InSync        Diverged
//!   create_ref      (no write)    update_ref
//!                                     |
//!                                 Conflict?
//!                                     |
//!                             ConflictRetried
//!                       re-resolve origin, update_ref
//!                                     |
//!                           Conflict again: SyncConflict
//! ```
//!
//! Ref updates never force. The retry is bounded to one attempt and always
//! uses an origin resolved after the failed write.

use std::sync::Arc;

use serde::Serialize;

use super::refs::RefResolver;
use super::RepoError;
use crate::core::types::{BranchName, Oid, RefName};
use crate::host::{GitHost, HostError, Repository};

/// Upstream branch used when none is given.
pub const DEFAULT_UPSTREAM_BRANCH: &str = "master";

/// Terminal state reached by a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// The fork branch did not exist and was created at the origin commit.
    Missing,
    /// The fork branch already pointed at the origin commit.
    InSync,
    /// The fork branch was moved to the origin commit.
    Diverged,
    /// The first update conflicted; the retry with a fresh origin succeeded.
    ConflictRetried,
}

/// Source and destination of one sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    /// Upstream repository full name
    pub source_repo: String,
    pub source_branch: BranchName,
    /// Fork repository full name
    pub dest_repo: String,
    pub dest_branch: BranchName,
}

impl SyncTarget {
    /// Pair a fork branch with its upstream.
    ///
    /// The upstream is `upstream_override` if given, else the fork's recorded
    /// parent.
    ///
    /// # Errors
    ///
    /// `RepoError::Configuration` if the repository is not a fork and no
    /// override is given.
    pub fn for_fork(
        fork: &Repository,
        branch: BranchName,
        upstream_override: Option<&str>,
        upstream_branch: BranchName,
    ) -> Result<Self, RepoError> {
        let source_repo = upstream_override
            .or(fork.parent.as_deref())
            .ok_or_else(|| {
                RepoError::Configuration(format!(
                    "{} is not a fork and no origin specified",
                    fork.full_name
                ))
            })?;

        Ok(Self {
            source_repo: source_repo.to_string(),
            source_branch: upstream_branch,
            dest_repo: fork.full_name.clone(),
            dest_branch: branch,
        })
    }
}

/// Result of a completed sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub state: SyncState,
    /// Commit the fork branch points at afterwards
    pub sha: Oid,
}

impl SyncOutcome {
    /// Whether the fork branch was written.
    pub fn changed(&self) -> bool {
        self.state != SyncState::InSync
    }
}

/// Keeps fork branches pointed at their upstream branch.
#[derive(Clone)]
pub struct ForkSyncEngine {
    host: Arc<dyn GitHost>,
    resolver: RefResolver,
}

impl ForkSyncEngine {
    pub fn new(host: Arc<dyn GitHost>) -> Self {
        Self {
            resolver: RefResolver::new(Arc::clone(&host)),
            host,
        }
    }

    /// Bring `target.dest_branch` in line with `target.source_branch`.
    ///
    /// # Errors
    ///
    /// - `RepoError::Host(HostError::NotFound)` if the upstream branch does not exist
    /// - `RepoError::SyncConflict` if the update conflicts twice
    /// - any other host error, unchanged
    pub async fn sync(&self, target: &SyncTarget) -> Result<SyncOutcome, RepoError> {
        let source_ref = RefName::for_branch(&target.source_branch);
        let dest_ref = RefName::for_branch(&target.dest_branch);

        let origin = self.resolve_origin(target, &source_ref).await?;
        let current = self.resolver.resolve(&target.dest_repo, &dest_ref).await?;

        let Some(current) = current else {
            tracing::info!(
                repo = %target.dest_repo,
                branch = %target.dest_branch,
                sha = %origin,
                "fork branch missing, creating"
            );
            self.host
                .create_ref(&target.dest_repo, &dest_ref, &origin)
                .await?;
            return Ok(SyncOutcome {
                state: SyncState::Missing,
                sha: origin,
            });
        };

        if current == origin {
            tracing::debug!(
                repo = %target.dest_repo,
                branch = %target.dest_branch,
                sha = %origin,
                "fork branch in sync"
            );
            return Ok(SyncOutcome {
                state: SyncState::InSync,
                sha: origin,
            });
        }

        tracing::info!(
            repo = %target.dest_repo,
            branch = %target.dest_branch,
            from = %current,
            to = %origin,
            "fork branch diverged, updating"
        );
        match self
            .host
            .update_ref(&target.dest_repo, &dest_ref, &origin, false)
            .await
        {
            Ok(_) => {
                return Ok(SyncOutcome {
                    state: SyncState::Diverged,
                    sha: origin,
                });
            }
            Err(e) if e.is_conflict() => {
                tracing::warn!(
                    repo = %target.dest_repo,
                    branch = %target.dest_branch,
                    error = %e,
                    "ref update conflicted, retrying once"
                );
            }
            Err(e) => return Err(e.into()),
        }

        let origin = self.resolve_origin(target, &source_ref).await?;
        match self
            .host
            .update_ref(&target.dest_repo, &dest_ref, &origin, false)
            .await
        {
            Ok(_) => Ok(SyncOutcome {
                state: SyncState::ConflictRetried,
                sha: origin,
            }),
            Err(e) if e.is_conflict() => Err(RepoError::SyncConflict {
                repo: target.dest_repo.clone(),
                branch: target.dest_branch.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve the upstream branch; a missing branch is `NotFound`.
    async fn resolve_origin(
        &self,
        target: &SyncTarget,
        source_ref: &RefName,
    ) -> Result<Oid, RepoError> {
        self.resolver
            .resolve(&target.source_repo, source_ref)
            .await?
            .ok_or_else(|| {
                HostError::NotFound(format!("{} in {}", source_ref, target.source_repo)).into()
            })
    }
}

impl std::fmt::Debug for ForkSyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForkSyncEngine")
            .field("host", &self.host.name())
            .finish()
    }
}
