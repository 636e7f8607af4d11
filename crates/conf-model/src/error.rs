//! Error types for conf-model

/// Result type for conf-model operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in conf-model operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or ambiguous declared shape, detected at schema build time
    #[error("Invalid schema {shape}: {message}")]
    Schema { shape: String, message: String },

    /// A stored value cannot convert to or from the declared kind
    #[error("Type mismatch at {path}: expected {expected}: {message}")]
    TypeMismatch {
        path: String,
        expected: String,
        message: String,
    },

    /// Set attempted on a read-only property
    #[error("Property is read-only: {property}")]
    ReadOnlyProperty { property: String },

    /// Dictionary key collision
    #[error("Duplicate key: {key}")]
    DuplicateKey { key: String },

    /// Operation on a deleted or disposed instance
    #[error("Configuration object has been deleted or disposed")]
    ObjectDisposed,

    /// Property name not declared by the shape
    #[error("Unknown property: {property}")]
    UnknownProperty { property: String },

    /// A validation hook rejected the instance
    #[error("Validation rule {rule} failed for {property}: {message}")]
    Validation {
        rule: String,
        property: String,
        message: String,
    },

    /// Error from the underlying store
    #[error(transparent)]
    Store(#[from] conf_store::Error),
}

impl Error {
    pub(crate) fn type_mismatch(
        path: &conf_store::ConfigPath,
        expected: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            path: path.as_str().to_string(),
            expected: expected.into(),
            message: message.into(),
        }
    }

    pub(crate) fn schema(shape: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            shape: shape.into(),
            message: message.into(),
        }
    }
}
