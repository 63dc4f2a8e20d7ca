//! repo::metadata
//!
//! Metadata documents and the layered sync configuration.
//!
//! # Metadata Layers
//!
//! 1. Base fields computed from the repository and its plugin identity
//! 2. The repository's `metadata.yml` overlay (organization repositories only)
//! 3. Rules, in order: CI badge, overlay name casing, release links,
//!    maintainer alias
//!
//! Base and overlay are merged shallowly; overlay keys win.
//!
//! # Sync Configuration
//!
//! The organization `config_defaults` document deep-merged with the
//! repository's `.sync.yml`. Repositories outside the organization get an
//! empty document.
//!
//! # Degradation
//!
//! A missing, unreadable or malformed overlay is treated as empty and logged
//! with its failure kind. It never fails the caller.

use std::sync::Arc;

use serde::Serialize;
use serde_yaml::{Mapping, Value};

use super::artifacts::build_artifact_urls;
use super::RepoError;
use crate::core::config::render_template;
use crate::core::document::{self, deep_merge};
use crate::core::identity::{plugin_capitalize, PluginIdentity};
use crate::host::{GitHost, HostError, Repository};

/// Repository-local metadata overlay.
pub const METADATA_FILE: &str = "metadata.yml";

/// Repository-local sync configuration.
pub const SYNC_FILE: &str = ".sync.yml";

/// Description used when the repository has none.
pub const DEFAULT_DESCRIPTION: &str = "No description available.";

/// Plugin display name that never gets a CI badge.
const BADGE_EXEMPT_NAME: &str = "Mesos";

/// Overlay maintainer alias for the organization itself.
const CORE_MAINTAINER: &str = "core";

/// Flat metadata record for one plugin repository.
///
/// Keys keep insertion order: base fields first, then keys only the overlay
/// introduced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetadataDocument(Mapping);

impl MetadataDocument {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value of `key`, if present and a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keys in document order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().filter_map(Value::as_str)
    }

    /// Render as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Render as YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn into_mapping(self) -> Mapping {
        self.0
    }

    fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(Value::from(key), value.into());
    }
}

/// Builds metadata documents and sync configurations.
#[derive(Clone)]
pub struct MetadataResolver {
    host: Arc<dyn GitHost>,
    org: String,
    org_defaults: Value,
    ci_badge_template: String,
    artifact_url_template: String,
}

impl MetadataResolver {
    pub fn new(
        host: Arc<dyn GitHost>,
        org: impl Into<String>,
        org_defaults: Value,
        ci_badge_template: impl Into<String>,
        artifact_url_template: impl Into<String>,
    ) -> Self {
        Self {
            host,
            org: org.into(),
            org_defaults,
            ci_badge_template: ci_badge_template.into(),
            artifact_url_template: artifact_url_template.into(),
        }
    }

    /// Whether `repo` belongs to the managed organization.
    pub fn is_org_owned(&self, repo: &Repository) -> bool {
        repo.owner.eq_ignore_ascii_case(&self.org)
    }

    /// Fetch and parse a YAML document from the repository.
    ///
    /// `Ok(None)` if the file does not exist.
    ///
    /// # Errors
    ///
    /// - `RepoError::Host` if the fetch fails
    /// - `RepoError::Document` if the file is not valid UTF-8 YAML
    pub async fn fetch_document(&self, repo: &str, path: &str) -> Result<Option<Value>, RepoError> {
        match self.host.get_file_content(repo, path).await? {
            Some(bytes) => Ok(Some(document::parse(path, &bytes)?)),
            None => Ok(None),
        }
    }

    /// Fetch a mapping document, degrading every failure to an empty mapping.
    async fn overlay_or_empty(&self, repo: &str, path: &str) -> Value {
        match self.fetch_document(repo, path).await {
            Ok(Some(doc)) if doc.is_mapping() => doc,
            Ok(Some(_)) => {
                tracing::warn!(repo, path, "overlay is not a mapping, ignoring");
                document::empty()
            }
            Ok(None) => {
                tracing::debug!(repo, path, "overlay not found");
                document::empty()
            }
            Err(RepoError::Document(e)) => {
                tracing::warn!(repo, path, error = %e, "overlay malformed, ignoring");
                document::empty()
            }
            Err(e) => {
                tracing::warn!(repo, path, error = %e, "overlay fetch failed, ignoring");
                document::empty()
            }
        }
    }

    /// Organization defaults deep-merged with the repository's `.sync.yml`.
    pub async fn sync_config(&self, repo: &Repository) -> Value {
        if !self.is_org_owned(repo) {
            tracing::debug!(
                repo = %repo.full_name,
                "not an organization repository, empty sync config"
            );
            return document::empty();
        }
        let overlay = self.overlay_or_empty(&repo.full_name, SYNC_FILE).await;
        deep_merge(&self.org_defaults, &overlay)
    }

    /// Build the metadata document of `repo`.
    ///
    /// `sync_config` supplies the build matrix for download links.
    ///
    /// # Errors
    ///
    /// Host errors from listing releases propagate.
    pub async fn metadata(
        &self,
        repo: &Repository,
        identity: &PluginIdentity,
        supported: bool,
        sync_config: &Value,
    ) -> Result<MetadataDocument, HostError> {
        let org_owned = self.is_org_owned(repo);
        let mut base = self.base_fields(repo, identity, supported);

        let mut overlay = if org_owned {
            self.overlay_or_empty(&repo.full_name, METADATA_FILE).await
        } else {
            document::empty()
        };

        if org_owned && identity.name != BADGE_EXEMPT_NAME && overlay.get("ci").is_none() {
            let badge = render_template(&self.ci_badge_template, &[("full_name", &repo.full_name)]);
            base.insert("ci", Value::Sequence(vec![Value::from(badge)]));
        }

        if let Some(name) = overlay.get("name").and_then(Value::as_str) {
            let normalized = plugin_capitalize(name);
            overlay["name"] = Value::from(normalized);
        }

        let releases = self.host.list_releases(&repo.full_name).await?;
        if let Some(latest) = releases.first() {
            base.insert("release_url", format!("{}/releases/latest", repo.html_url));
            let downloads = build_artifact_urls(
                sync_config,
                &self.artifact_url_template,
                &repo.name,
                &latest.tag_name,
            );
            match serde_yaml::to_value(&downloads) {
                Ok(value) => base.insert("download", value),
                Err(e) => {
                    tracing::warn!(
                        repo = %repo.full_name,
                        error = %e,
                        "download links not serializable"
                    );
                }
            }
        }

        if overlay.get("maintainer").and_then(Value::as_str) == Some(CORE_MAINTAINER) {
            overlay["maintainer"] = Value::from(self.org.clone());
        }

        if let Value::Mapping(entries) = overlay {
            for (key, value) in entries {
                match key.as_str() {
                    Some(key) => base.insert(key, value),
                    None => {
                        tracing::debug!(
                            repo = %repo.full_name,
                            ?key,
                            "skipping non-string overlay key"
                        );
                    }
                }
            }
        }

        Ok(base)
    }

    fn base_fields(
        &self,
        repo: &Repository,
        identity: &PluginIdentity,
        supported: bool,
    ) -> MetadataDocument {
        let maintainer_url = repo
            .html_url
            .rsplit_once('/')
            .map(|(owner_url, _)| owner_url.to_string())
            .unwrap_or_else(|| format!("https://github.com/{}", repo.owner));

        let mut doc = MetadataDocument::default();
        doc.insert("name", identity.name.clone());
        doc.insert("type", identity.plugin_type.as_str());
        doc.insert("supported", supported);
        doc.insert(
            "description",
            repo.description
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
        );
        doc.insert("maintainer", repo.owner.clone());
        doc.insert("maintainer_url", maintainer_url);
        doc.insert("repo_name", repo.name.clone());
        doc.insert("repo_url", repo.html_url.clone());
        doc
    }
}

impl std::fmt::Debug for MetadataResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataResolver")
            .field("host", &self.host.name())
            .field("org", &self.org)
            .finish_non_exhaustive()
    }
}
