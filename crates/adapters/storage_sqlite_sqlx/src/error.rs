//! Storage-specific error type wrapping sqlx errors.

use topomap_domain::codec::CodecError;
use topomap_domain::error::MapError;

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failure.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// A stored payload is not a valid manifest encoding.
    #[error("stored manifest payload is corrupt")]
    Codec(#[from] CodecError),

    /// A migration failure.
    #[error("failed to run migrations")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A sequence number does not fit the `INTEGER` column.
    #[error("sequence {0} is out of range")]
    SequenceOutOfRange(u64),
}

impl From<StorageError> for MapError {
    fn from(err: StorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}
