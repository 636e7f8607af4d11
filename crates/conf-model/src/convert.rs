//! Bidirectional conversion between stored strings and scalar values
//!
//! Conversion is culture-invariant: integers and floats use Rust's default
//! formatting and parsing, booleans are `true`/`false` (case-insensitive on
//! the way in). Nested objects, collections and dictionaries never pass
//! through here; the object model constructs child instances for those and
//! recurses.

use crate::schema::{PropertyDescriptor, ValueKind};
use crate::{Error, Result, ScalarKind, Value};
use conf_store::ConfigPath;

/// Convert an in-memory value into its store string form.
///
/// `None` means "no entry": a null value maps to removing the store entry
/// rather than writing a sentinel.
pub fn to_store(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Boolean(b) => Some(b.to_string()),
    }
}

/// Convert a raw store entry into the declared scalar value.
///
/// An absent entry yields the declared default when one is set, `Null` for
/// nullable properties, and a [`Error::TypeMismatch`] otherwise. An empty
/// entry counts as absent for every kind except `String`.
pub fn from_store(
    raw: Option<&str>,
    descriptor: &PropertyDescriptor,
    path: &ConfigPath,
) -> Result<Value> {
    let kind = match descriptor.kind() {
        ValueKind::Scalar(kind) => *kind,
        other => {
            return Err(Error::type_mismatch(
                path,
                other.describe(),
                "non-scalar kinds do not convert directly",
            ));
        }
    };

    let raw = match raw {
        Some(s) if !s.is_empty() || kind == ScalarKind::String => s,
        _ => {
            if let Some(default) = descriptor.default_value() {
                return Ok(default.clone());
            }
            if descriptor.is_nullable() {
                return Ok(Value::Null);
            }
            return Err(Error::type_mismatch(
                path,
                kind.to_string(),
                "entry is absent and the property declares no default",
            ));
        }
    };

    parse_scalar(raw, kind)
        .map_err(|message| Error::type_mismatch(path, kind.to_string(), message))
}

fn parse_scalar(raw: &str, kind: ScalarKind) -> std::result::Result<Value, String> {
    match kind {
        ScalarKind::String => Ok(Value::String(raw.to_string())),
        ScalarKind::Integer => raw
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|e| format!("cannot parse {raw:?} as integer: {e}")),
        ScalarKind::Float => raw
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| format!("cannot parse {raw:?} as float: {e}")),
        ScalarKind::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Boolean(true)),
            "false" => Ok(Value::Boolean(false)),
            _ => Err(format!("cannot parse {raw:?} as boolean")),
        },
    }
}

/// Check that `value` may be assigned to the property.
///
/// Rejects kind disagreements and nulls on non-nullable properties.
pub fn check_assignable(
    value: &Value,
    descriptor: &PropertyDescriptor,
    path: &ConfigPath,
) -> Result<()> {
    let kind = match descriptor.kind() {
        ValueKind::Scalar(kind) => *kind,
        other => {
            return Err(Error::type_mismatch(
                path,
                other.describe(),
                "cannot assign a scalar to a structured property",
            ));
        }
    };
    if value.is_null() && !descriptor.is_nullable() {
        return Err(Error::type_mismatch(
            path,
            kind.to_string(),
            "property is not nullable",
        ));
    }
    if !value.matches_kind(kind) {
        return Err(Error::type_mismatch(
            path,
            kind.to_string(),
            format!("incompatible value {value:?}"),
        ));
    }
    Ok(())
}
