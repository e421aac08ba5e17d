//! Error taxonomy shared by the registry and the call surface.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Convenience wrapper around `Result<T, RegistryError>`.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Failures surfaced by registry and launcher operations.
///
/// The API layer turns every variant into a `{success: false, message}`
/// payload, so the `Display` text is what the user ends up reading.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// A required field is empty, a directory is missing, or an identifier
    /// is not numeric.
    #[error("{0}")]
    Validation(String),

    /// No record matches the given id or index, or a file to launch is missing.
    #[error("{0}")]
    NotFound(String),

    /// An active record already owns the directory.
    #[error("a game is already registered for directory {}", .directory.display())]
    Conflict {
        /// Directory held by the existing record.
        directory: PathBuf,
        /// Id of the record that holds it.
        existing_id: u64,
    },

    /// Reading or writing a file failed.
    #[error("failed to {action} {}: {source}", .path.display())]
    Io {
        /// Short verb describing the attempted operation.
        action: &'static str,
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A document exists but is not valid JSON of the expected shape.
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        /// Document path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

impl RegistryError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// Short machine-readable category, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Io { .. } => "io",
            Self::Parse { .. } => "parse",
        }
    }
}
