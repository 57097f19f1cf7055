use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by the record and photo stores.
///
/// Photo deletion never produces one of these; it is logged and swallowed.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database could not be opened or its schema created.
    #[error("Meal database unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Photo I/O error for {}: {source}", .path.display())]
    Photo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Stored meal '{id}' is unreadable: {reason}")]
    CorruptRow { id: String, reason: String },
}

impl StoreError {
    pub(crate) fn photo(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Photo {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
