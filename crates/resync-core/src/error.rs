//! Error types for the source core.
//!
//! A missing key is not an error on read paths (those return `Option`),
//! so the variants here are the things callers actually have to act on.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience type for fallible core operations.
pub type Result<T> = std::result::Result<T, ResyncError>;

/// Things that can go wrong while indexing or mutating resources.
#[derive(Error, Debug)]
pub enum ResyncError {
    /// The key is not in the repository.
    #[error("resource not found: '{key}'")]
    NotFound { key: String },

    /// The file disappeared between the event and the read. Happens on a
    /// rapid create+delete; the event is dropped.
    #[error("source file vanished before it could be read: '{path}'")]
    MissingSource { path: PathBuf },

    /// Reading or hashing the file failed for another reason.
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration cannot be used to start a source.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ResyncError {
    /// Wraps an IO error with the offending path.
    ///
    /// `ErrorKind::NotFound` becomes [`ResyncError::MissingSource`].
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::MissingSource { path }
        } else {
            Self::Io { path, source }
        }
    }

    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// True for the "normal" outcomes that should not be logged as errors.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// A subscriber refused or failed to take a change record.
///
/// Delivery is best-effort: the notifier logs this and moves on.
#[derive(Error, Debug)]
#[error("change delivery failed: {0}")]
pub struct DeliveryError(pub String);

impl DeliveryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
