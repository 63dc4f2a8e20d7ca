//! core::identity
//!
//! Plugin identity derived from the repository naming convention.
//!
//! Repositories are named `<prefix>-<type>-<name>`, for example
//! `snap-plugin-collector-cpu`. The type segment is one of `collector`,
//! `processor` or `publisher`; the name segment is turned into a display
//! name by [`plugin_capitalize`].
//!
//! Parsing is pure and performs no I/O.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from identity parsing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("'{0}' is not named <prefix>-<collector|processor|publisher>-<name>")]
    UnrecognizedName(String),
}

/// Kind of plugin a repository provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginType {
    Collector,
    Processor,
    Publisher,
    Unknown,
}

impl PluginType {
    /// Map a type segment to a plugin type. Unrecognized segments map to `Unknown`.
    pub fn from_segment(segment: &str) -> Self {
        match segment {
            "collector" => PluginType::Collector,
            "processor" => PluginType::Processor,
            "publisher" => PluginType::Publisher,
            _ => PluginType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PluginType::Collector => "collector",
            PluginType::Processor => "processor",
            PluginType::Publisher => "publisher",
            PluginType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for PluginType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Display name and type of a plugin repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginIdentity {
    /// Display name, e.g. `CPU` for `snap-plugin-collector-cpu`
    pub name: String,
    /// Plugin type
    #[serde(rename = "type")]
    pub plugin_type: PluginType,
}

impl PluginIdentity {
    /// Parse the identity from a repository name.
    ///
    /// Accepts either the short name or the `owner/name` full name.
    ///
    /// # Example
    ///
    /// ```
    /// use pluginsync::core::identity::{PluginIdentity, PluginType};
    ///
    /// let id = PluginIdentity::parse("intelsdi-x/snap-plugin-collector-cpu").unwrap();
    /// assert_eq!(id.name, "CPU");
    /// assert_eq!(id.plugin_type, PluginType::Collector);
    ///
    /// assert!(PluginIdentity::parse("not-a-plugin").is_err());
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::UnrecognizedName` if the name does not match the convention.
    pub fn parse(repo_name: &str) -> Result<Self, IdentityError> {
        let short = repo_name.rsplit('/').next().unwrap_or(repo_name);
        let captures = name_pattern()
            .captures(short)
            .ok_or_else(|| IdentityError::UnrecognizedName(repo_name.to_string()))?;

        Ok(Self {
            name: plugin_capitalize(&captures["name"]),
            plugin_type: PluginType::from_segment(&captures["type"]),
        })
    }
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<prefix>.+?)-(?P<type>collector|processor|publisher)-(?P<name>.+)$")
            .expect("plugin name pattern is valid")
    })
}

/// Words rendered fully upper-case in display names.
const ACRONYMS: &[&str] = &[
    "aws", "cpu", "dbi", "dns", "gpu", "hana", "http", "iis", "ipmi", "kvm", "nfs", "os", "pcm",
    "rpc", "snmp", "sql", "tcp", "udp", "vm",
];

/// Normalize a plugin name segment into its display casing.
///
/// Words are split on `-` and `_`; known acronyms are upper-cased, other
/// words get a leading capital. Words are joined with a space.
///
/// # Example
///
/// ```
/// use pluginsync::core::identity::plugin_capitalize;
///
/// assert_eq!(plugin_capitalize("cpu"), "CPU");
/// assert_eq!(plugin_capitalize("mesos"), "Mesos");
/// assert_eq!(plugin_capitalize("docker_compose"), "Docker Compose");
/// assert_eq!(plugin_capitalize("kvm-stats"), "KVM Stats");
/// ```
pub fn plugin_capitalize(name: &str) -> String {
    name.split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let lower = word.to_ascii_lowercase();
            if ACRONYMS.contains(&lower.as_str()) {
                lower.to_ascii_uppercase()
            } else {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
