//! Flattening structured documents into colon-path store entries
//!
//! Mirrors the layout produced by hierarchical configuration providers:
//! object members become path segments, array elements become decimal index
//! segments, and scalars become the leaf string values.

use crate::{ConfigPath, Error, MemoryStore, Result, path::escape_segment};
use std::fs;
use std::path::Path;

/// Flatten a parsed JSON document into `(path, value)` entries.
///
/// Nulls flatten to the empty string, matching an "unset but present" entry.
pub fn flatten_json(value: &serde_json::Value) -> Vec<(ConfigPath, String)> {
    let mut entries = Vec::new();
    flatten_json_into(value, ConfigPath::root(), &mut entries);
    entries
}

fn flatten_json_into(
    value: &serde_json::Value,
    path: ConfigPath,
    entries: &mut Vec<(ConfigPath, String)>,
) {
    use serde_json::Value;
    match value {
        Value::Object(members) => {
            for (key, member) in members {
                flatten_json_into(member, path.join(&escape_segment(key)), entries);
            }
        }
        Value::Array(elements) => {
            for (index, element) in elements.iter().enumerate() {
                flatten_json_into(element, path.join_index(index), entries);
            }
        }
        Value::Null => entries.push((path, String::new())),
        Value::Bool(b) => entries.push((path, b.to_string())),
        Value::Number(n) => entries.push((path, n.to_string())),
        Value::String(s) => entries.push((path, s.clone())),
    }
}

/// Flatten a parsed TOML document into `(path, value)` entries.
pub fn flatten_toml(value: &toml::Value) -> Vec<(ConfigPath, String)> {
    let mut entries = Vec::new();
    flatten_toml_into(value, ConfigPath::root(), &mut entries);
    entries
}

fn flatten_toml_into(
    value: &toml::Value,
    path: ConfigPath,
    entries: &mut Vec<(ConfigPath, String)>,
) {
    use toml::Value;
    match value {
        Value::Table(members) => {
            for (key, member) in members {
                flatten_toml_into(member, path.join(&escape_segment(key)), entries);
            }
        }
        Value::Array(elements) => {
            for (index, element) in elements.iter().enumerate() {
                flatten_toml_into(element, path.join_index(index), entries);
            }
        }
        Value::String(s) => entries.push((path, s.clone())),
        Value::Integer(i) => entries.push((path, i.to_string())),
        Value::Float(f) => entries.push((path, f.to_string())),
        Value::Boolean(b) => entries.push((path, b.to_string())),
        Value::Datetime(dt) => entries.push((path, dt.to_string())),
    }
}

impl MemoryStore {
    /// Build a store from a JSON document string.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| Error::Parse {
                format: "JSON".into(),
                message: e.to_string(),
            })?;
        Ok(Self::with_entries(flatten_json(&value)))
    }

    /// Build a store from a TOML document string.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let value: toml::Value = toml::from_str(text).map_err(|e| Error::Parse {
            format: "TOML".into(),
            message: e.to_string(),
        })?;
        Ok(Self::with_entries(flatten_toml(&value)))
    }

    /// Build a store from a JSON or TOML file, detecting the format from
    /// the file extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");
        match extension.to_lowercase().as_str() {
            "json" => Self::from_json_str(&content),
            "toml" => Self::from_toml_str(&content),
            other => Err(Error::Parse {
                format: other.to_string(),
                message: "unsupported document format".into(),
            }),
        }
    }
}
