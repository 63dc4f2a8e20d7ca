//! core::config
//!
//! Settings loading and the organization defaults document.
//!
//! # Settings Locations
//!
//! Searched in order:
//! 1. `$PLUGINSYNC_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/pluginsync/config.toml`
//! 3. `~/.pluginsync/config.toml`
//!
//! Missing files are not an error; defaults are used.
//!
//! # Organization Defaults
//!
//! `defaults_file` points at a YAML document (`config_defaults`) that is the
//! base layer for every organization repository's `.sync.yml`.
//!
//! # Example
//!
//! ```no_run
//! use pluginsync::core::config::Config;
//!
//! let config = Config::load().unwrap();
//! println!("org: {}", config.org());
//! let defaults = config.org_defaults().unwrap();
//! # let _ = defaults;
//! ```

pub mod schema;

pub use schema::{SettingsFile, TemplatesConfig};

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use thiserror::Error;

use crate::core::document;

/// Default organization owning the plugin fleet.
pub const DEFAULT_ORG: &str = "intelsdi-x";

/// Default host API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Default tool name used in commit messages.
pub const DEFAULT_TOOL_NAME: &str = "pluginsync";

/// Default build artifact URL template.
pub const DEFAULT_ARTIFACT_URL_TEMPLATE: &str =
    "http://snap.ci.snap-telemetry.io/plugins/{repo}/{build}/{os}/{arch}/{repo}";

/// Default CI badge template.
pub const DEFAULT_CI_BADGE_TEMPLATE: &str = "https://travis-ci.org/{full_name}.svg?branch=master";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Loaded settings with defaults applied through accessors.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Raw settings file contents
    pub settings: SettingsFile,
    /// Path the settings were loaded from (if any)
    path: Option<PathBuf>,
}

impl Config {
    /// Load settings from the standard locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file exists but cannot be read, parsed
    /// or validated.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::locate() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load settings from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let settings: SettingsFile =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        settings.validate()?;

        tracing::debug!(path = %path.display(), "loaded settings");
        Ok(Self {
            settings,
            path: Some(path.to_path_buf()),
        })
    }

    /// Build a config from in-memory settings.
    pub fn from_settings(settings: SettingsFile) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            settings,
            path: None,
        })
    }

    /// Find the first existing settings file.
    fn locate() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("PLUGINSYNC_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("pluginsync/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        dirs::home_dir()
            .map(|home| home.join(".pluginsync/config.toml"))
            .filter(|path| path.exists())
    }

    /// Load the organization defaults document.
    ///
    /// Returns an empty mapping when no `defaults_file` is configured.
    ///
    /// # Errors
    ///
    /// A configured but unreadable or malformed defaults file is an error:
    /// unlike per-repository overlays, the defaults are operator-controlled.
    pub fn org_defaults(&self) -> Result<Value, ConfigError> {
        let Some(path) = self.defaults_path() else {
            return Ok(document::empty());
        };

        let bytes = fs::read(&path).map_err(|e| ConfigError::ReadError {
            path: path.clone(),
            source: e,
        })?;
        document::parse(&path.display().to_string(), &bytes).map_err(|e| {
            ConfigError::ParseError {
                path: path.clone(),
                message: e.to_string(),
            }
        })
    }

    /// Resolve `defaults_file`, relative paths against the settings file's directory.
    fn defaults_path(&self) -> Option<PathBuf> {
        let configured = self.settings.defaults_file.as_ref()?;
        if configured.is_absolute() {
            return Some(configured.clone());
        }
        match self.path.as_ref().and_then(|p| p.parent()) {
            Some(dir) => Some(dir.join(configured)),
            None => Some(configured.clone()),
        }
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// Organization login. Defaults to `intelsdi-x`.
    pub fn org(&self) -> &str {
        self.settings.org.as_deref().unwrap_or(DEFAULT_ORG)
    }

    /// Host API base URL.
    pub fn api_base(&self) -> &str {
        self.settings
            .api_base
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE)
    }

    /// Tool name for commit messages.
    pub fn tool_name(&self) -> &str {
        self.settings
            .tool_name
            .as_deref()
            .unwrap_or(DEFAULT_TOOL_NAME)
    }

    /// Build artifact URL template.
    pub fn artifact_url_template(&self) -> &str {
        self.settings
            .templates
            .as_ref()
            .and_then(|t| t.artifact_url.as_deref())
            .unwrap_or(DEFAULT_ARTIFACT_URL_TEMPLATE)
    }

    /// CI badge URL template.
    pub fn ci_badge_template(&self) -> &str {
        self.settings
            .templates
            .as_ref()
            .and_then(|t| t.ci_badge.as_deref())
            .unwrap_or(DEFAULT_CI_BADGE_TEMPLATE)
    }

    /// Path the settings were loaded from.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Substitute `{key}` placeholders in a template.
///
/// # Example
///
/// ```
/// use pluginsync::core::config::render_template;
///
/// let url = render_template("https://ci/{repo}/{build}", &[("repo", "x"), ("build", "7")]);
/// assert_eq!(url, "https://ci/x/7");
/// ```
pub fn render_template(template: &str, values: &[(&str, &str)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |acc, (key, value)| {
            acc.replace(&format!("{{{}}}", key), value)
        })
}
