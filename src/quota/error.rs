//! Quota History Error Types
//!
//! Errors raised while loading, persisting or addressing event histories.

use std::io;
use std::path::PathBuf;

/// Result type alias for history operations
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Error types for event history operations
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// Existing durable data could not be decoded into a timestamp sequence.
    ///
    /// History at this location must be treated as lost; it is never reset
    /// silently.
    #[error("Event history at {path:?} is corrupt: {reason}")]
    StorageCorrupt { path: PathBuf, reason: String },

    /// Reading or writing the backing file failed
    #[error("I/O error on event history {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Bucket name cannot be used as a storage file stem
    #[error("Invalid quota bucket name: {0:?}")]
    InvalidBucket(String),
}

impl HistoryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        HistoryError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        HistoryError::StorageCorrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error means the stored history was unreadable
    pub fn is_corrupt(&self) -> bool {
        matches!(self, HistoryError::StorageCorrupt { .. })
    }
}
