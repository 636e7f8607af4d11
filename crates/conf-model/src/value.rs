//! In-memory representation of scalar configuration values

use serde::{Deserialize, Serialize};

/// The scalar kinds a property may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    String,
    Integer,
    Float,
    Boolean,
}

impl std::fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
        };
        write!(f, "{name}")
    }
}

/// One in-memory scalar value.
///
/// `Null` represents an absent value for nullable properties and for
/// properties that have never been loaded or set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether this value can live in a slot declared with `kind`.
    ///
    /// `Null` is compatible with every kind; nullability is enforced
    /// separately by the descriptor.
    pub fn matches_kind(&self, kind: ScalarKind) -> bool {
        matches!(
            (self, kind),
            (Self::Null, _)
                | (Self::String(_), ScalarKind::String)
                | (Self::Integer(_), ScalarKind::Integer)
                | (Self::Float(_), ScalarKind::Float)
                | (Self::Boolean(_), ScalarKind::Boolean)
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::String(s) => write!(f, "{s}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Boolean(b) => write!(f, "{b}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_matches_every_kind() {
        for kind in [
            ScalarKind::String,
            ScalarKind::Integer,
            ScalarKind::Float,
            ScalarKind::Boolean,
        ] {
            assert!(Value::Null.matches_kind(kind));
        }
    }

    #[test]
    fn kinds_do_not_cross_match() {
        assert!(Value::Integer(1).matches_kind(ScalarKind::Integer));
        assert!(!Value::Integer(1).matches_kind(ScalarKind::String));
        assert!(!Value::String("1".into()).matches_kind(ScalarKind::Integer));
        assert!(!Value::Boolean(true).matches_kind(ScalarKind::Float));
    }

    #[test]
    fn accessors_return_inner_values() {
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert_eq!(Value::from(7i64).as_i64(), Some(7));
        assert_eq!(Value::from(1.5f64).as_f64(), Some(1.5));
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert_eq!(Value::Null.as_str(), None);
    }
}
