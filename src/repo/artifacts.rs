//! repo::artifacts
//!
//! Build artifact URLs from the merged build matrix.
//!
//! The matrix lives at `global.build.matrix` in the merged sync
//! configuration and is a list of `{GOOS, GOARCH}` mappings:
//!
//! ```yaml
//! global:
//!   build:
//!     matrix:
//!       - GOOS: linux
//!         GOARCH: amd64
//! ```

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_yaml::Value;

use crate::core::config::render_template;
use crate::core::document::deep_fetch;

/// Location of the build matrix in the sync configuration.
pub const MATRIX_PATH: [&str; 3] = ["global", "build", "matrix"];

/// One downloadable build for a platform.
///
/// Serializes as a single-entry mapping `{"<os>/<arch>": url}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformArtifact {
    pub os: String,
    pub arch: String,
    pub url: String,
}

impl PlatformArtifact {
    /// `<os>/<arch>` key, e.g. `linux/x86_64`.
    pub fn platform_key(&self) -> String {
        format!("{}/{}", self.os, self.arch)
    }
}

impl Serialize for PlatformArtifact {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.platform_key(), &self.url)?;
        map.end()
    }
}

/// Normalize a Go architecture name to the artifact store's naming.
pub fn normalize_arch(arch: &str) -> &str {
    match arch {
        "amd64" => "x86_64",
        other => other,
    }
}

/// Expand the build matrix of `sync_config` into artifact URLs.
///
/// `template` takes `{repo}`, `{build}`, `{os}` and `{arch}` placeholders.
/// A missing matrix yields no artifacts; matrix entries without a string
/// `GOOS` and `GOARCH` are skipped.
///
/// # Example
///
/// ```
/// use pluginsync::repo::artifacts::build_artifact_urls;
///
/// let config: serde_yaml::Value = serde_yaml::from_str(
///     "global: {build: {matrix: [{GOOS: linux, GOARCH: amd64}]}}",
/// ).unwrap();
/// let urls = build_artifact_urls(&config, "https://ci/{repo}/{build}/{os}/{arch}", "cpu", "7");
/// assert_eq!(urls[0].platform_key(), "linux/x86_64");
/// assert_eq!(urls[0].url, "https://ci/cpu/7/linux/x86_64");
/// ```
pub fn build_artifact_urls(
    sync_config: &Value,
    template: &str,
    repo_name: &str,
    build_id: &str,
) -> Vec<PlatformArtifact> {
    let Some(matrix) = deep_fetch(sync_config, &MATRIX_PATH).and_then(Value::as_sequence) else {
        return Vec::new();
    };

    matrix
        .iter()
        .filter_map(|entry| {
            let os = entry.get("GOOS").and_then(Value::as_str);
            let arch = entry.get("GOARCH").and_then(Value::as_str);
            match (os, arch) {
                (Some(os), Some(arch)) => Some((os, normalize_arch(arch))),
                _ => {
                    tracing::debug!(repo = repo_name, ?entry, "skipping incomplete matrix entry");
                    None
                }
            }
        })
        .map(|(os, arch)| PlatformArtifact {
            os: os.to_string(),
            arch: arch.to_string(),
            url: render_template(
                template,
                &[("repo", repo_name), ("build", build_id), ("os", os), ("arch", arch)],
            ),
        })
        .collect()
}
