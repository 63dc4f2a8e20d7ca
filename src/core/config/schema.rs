//! core::config::schema
//!
//! Settings file schema.
//!
//! # Example
//!
//! ```toml
//! org = "intelsdi-x"
//! api_base = "https://api.github.com"
//! tool_name = "pluginsync"
//! defaults_file = "/etc/pluginsync/config_defaults.yml"
//!
//! [templates]
//! artifact_url = "http://snap.ci.snap-telemetry.io/plugins/{repo}/{build}/{os}/{arch}/{repo}"
//! ci_badge = "https://travis-ci.org/{full_name}.svg?branch=master"
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Contents of the settings file. Every key is optional; accessors on
/// [`super::Config`] supply the defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsFile {
    /// Organization that owns the managed plugin repositories
    pub org: Option<String>,

    /// Host API base URL (GitHub Enterprise installs use `/api/v3`)
    pub api_base: Option<String>,

    /// Tool name written into generated commit messages
    pub tool_name: Option<String>,

    /// Organization-wide `config_defaults` YAML document
    pub defaults_file: Option<PathBuf>,

    /// URL templates
    pub templates: Option<TemplatesConfig>,
}

impl SettingsFile {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(org) = &self.org {
            if org.trim().is_empty() || org.contains('/') {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid org '{}', must be a bare organization login",
                    org
                )));
            }
        }

        if let Some(api_base) = &self.api_base {
            if !api_base.starts_with("https://") && !api_base.starts_with("http://") {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid api_base '{}', must be an http(s) URL",
                    api_base
                )));
            }
        }

        if let Some(tool_name) = &self.tool_name {
            if tool_name.trim().is_empty() {
                return Err(ConfigError::InvalidValue("tool_name cannot be empty".into()));
            }
        }

        if let Some(templates) = &self.templates {
            templates.validate()?;
        }

        Ok(())
    }
}

/// URL templates with `{placeholder}` substitution.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TemplatesConfig {
    /// Build artifact URL; placeholders `{repo}`, `{build}`, `{os}`, `{arch}`
    pub artifact_url: Option<String>,

    /// CI badge image URL; placeholder `{full_name}`
    pub ci_badge: Option<String>,
}

impl TemplatesConfig {
    /// Validate that each template carries its required placeholders.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(template) = &self.artifact_url {
            for placeholder in ["{build}", "{os}", "{arch}"] {
                if !template.contains(placeholder) {
                    return Err(ConfigError::InvalidValue(format!(
                        "artifact_url template is missing {}",
                        placeholder
                    )));
                }
            }
        }
        if let Some(template) = &self.ci_badge {
            if !template.contains("{full_name}") {
                return Err(ConfigError::InvalidValue(
                    "ci_badge template is missing {full_name}".into(),
                ));
            }
        }
        Ok(())
    }
}
