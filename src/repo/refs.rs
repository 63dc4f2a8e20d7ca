//! repo::refs
//!
//! Ref resolution by exact name.

use std::sync::Arc;

use crate::core::types::{Oid, RefName};
use crate::host::{GitHost, HostError};

/// Resolves a ref of a repository to the commit it points at.
///
/// Every call lists the repository's refs afresh; nothing is cached, so two
/// resolutions around a failed write observe the host's state at each point.
#[derive(Clone)]
pub struct RefResolver {
    host: Arc<dyn GitHost>,
}

impl RefResolver {
    pub fn new(host: Arc<dyn GitHost>) -> Self {
        Self { host }
    }

    /// Current target of `name` in `repo`, or `None` if the ref does not exist.
    ///
    /// Matching is exact: `refs/heads/master` does not match
    /// `refs/heads/master-old`.
    ///
    /// # Errors
    ///
    /// Host errors from listing the refs propagate unchanged.
    pub async fn resolve(&self, repo: &str, name: &RefName) -> Result<Option<Oid>, HostError> {
        let refs = self.host.list_refs(repo).await?;
        let sha = refs.into_iter().find(|r| &r.name == name).map(|r| r.sha);
        tracing::debug!(repo, refname = %name, found = sha.is_some(), "resolved ref");
        Ok(sha)
    }
}

impl std::fmt::Debug for RefResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefResolver")
            .field("host", &self.host.name())
            .finish()
    }
}
