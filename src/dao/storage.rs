use std::{io, path::PathBuf};

use thiserror::Error;

use crate::dao::models::EventId;

/// Result alias for snapshot store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error raised by snapshot stores regardless of the backing medium.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No document exists for the event.
    #[error("no cached document for event {id}")]
    NotFound { id: EventId },
    /// A document exists but cannot be decoded.
    #[error("cached document for event {id} is corrupt")]
    Corrupt {
        id: EventId,
        #[source]
        source: serde_json::Error,
    },
    /// A document could not be encoded before writing.
    #[error("failed to encode document for event {id}")]
    Encode {
        id: EventId,
        #[source]
        source: serde_json::Error,
    },
    /// The backing medium failed.
    #[error("snapshot store I/O failed on `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    /// Construct an I/O error for the given path.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error only means the document does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
