//! core::document
//!
//! Nested key-value documents (`.sync.yml`, `metadata.yml`, organization
//! defaults) and the two primitives used to layer them.
//!
//! Documents are plain [`serde_yaml::Value`]s. Mappings keep insertion order,
//! so a merged document lists default keys first, followed by keys that only
//! the override introduced.
//!
//! - [`deep_merge`] merges an override document onto a base document.
//! - [`deep_fetch`] looks up a dotted path and yields `None` for any missing
//!   segment.

use serde_yaml::{Mapping, Value};
use thiserror::Error;

/// Errors from decoding a fetched document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("'{path}' is not valid UTF-8")]
    Encoding { path: String },

    #[error("failed to parse '{path}': {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
}

/// An empty mapping document.
pub fn empty() -> Value {
    Value::Mapping(Mapping::new())
}

/// Parse raw file bytes into a document.
///
/// An empty file parses to an empty mapping rather than `null`.
///
/// # Errors
///
/// Returns `DocumentError` if the bytes are not UTF-8 or not valid YAML.
pub fn parse(path: &str, bytes: &[u8]) -> Result<Value, DocumentError> {
    let text = std::str::from_utf8(bytes).map_err(|_| DocumentError::Encoding {
        path: path.to_string(),
    })?;
    let value: Value = serde_yaml::from_str(text).map_err(|source| DocumentError::Parse {
        path: path.to_string(),
        source,
    })?;
    Ok(match value {
        Value::Null => empty(),
        other => other,
    })
}

/// Recursively merge `overrides` onto `base`.
///
/// For keys present on both sides, two mappings merge recursively; any other
/// combination takes the override value as a whole (arrays are replaced, not
/// concatenated). Keys present on one side only are kept. If either argument
/// is not a mapping the override wins outright.
///
/// # Example
///
/// ```
/// use pluginsync::core::document::deep_merge;
///
/// let base: serde_yaml::Value = serde_yaml::from_str("a: {x: 1, y: 2}").unwrap();
/// let over: serde_yaml::Value = serde_yaml::from_str("a: {y: 9, z: 3}").unwrap();
/// let merged = deep_merge(&base, &over);
///
/// let expected: serde_yaml::Value = serde_yaml::from_str("a: {x: 1, y: 9, z: 3}").unwrap();
/// assert_eq!(merged, expected);
/// ```
pub fn deep_merge(base: &Value, overrides: &Value) -> Value {
    match (base, overrides) {
        (Value::Mapping(base_map), Value::Mapping(override_map)) => {
            let mut merged = base_map.clone();
            for (key, override_value) in override_map {
                let value = match merged.get(key) {
                    Some(base_value) => deep_merge(base_value, override_value),
                    None => override_value.clone(),
                };
                merged.insert(key.clone(), value);
            }
            Value::Mapping(merged)
        }
        (_, other) => other.clone(),
    }
}

/// Look up a path of mapping keys.
///
/// Returns `None` as soon as a segment is missing or an intermediate value is
/// not a mapping.
///
/// # Example
///
/// ```
/// use pluginsync::core::document::deep_fetch;
///
/// let doc: serde_yaml::Value = serde_yaml::from_str("global: {build: {matrix: []}}").unwrap();
/// assert!(deep_fetch(&doc, &["global", "build", "matrix"]).is_some());
/// assert!(deep_fetch(&doc, &["global", "deploy", "matrix"]).is_none());
/// ```
pub fn deep_fetch<'a>(doc: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(doc, |current, segment| current.as_mapping()?.get(*segment))
}

/// [`deep_fetch`] with a dotted path string (`"global.build.matrix"`).
pub fn deep_fetch_dotted<'a>(doc: &'a Value, dotted: &str) -> Option<&'a Value> {
    let segments: Vec<&str> = dotted.split('.').filter(|s| !s.is_empty()).collect();
    deep_fetch(doc, &segments)
}
