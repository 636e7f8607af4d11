//! Error types for conf-store

use std::path::PathBuf;

/// Result type for conf-store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in conf-store operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The store refused a write at the given path
    #[error("Write rejected at {path}: {reason}")]
    WriteRejected { path: String, reason: String },

    /// A document could not be parsed into store entries
    #[error("Failed to parse {format} document: {message}")]
    Parse { format: String, message: String },

    /// I/O error while reading a document file
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
