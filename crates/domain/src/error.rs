//! Pipeline-level error type shared across the workspace.
//!
//! Entity-, device- and area-scoped problems are never errors: they are
//! collected as [`ValidationIssue`](crate::issue::ValidationIssue)s so one
//! build yields one complete report. `MapError` is reserved for failures that
//! abort a build. Each layer defines its own typed errors and converts into
//! `MapError` via `From`.

use crate::codec::CodecError;
use crate::diff::IncompatibleSchema;
use crate::projection::ProjectionError;
use crate::schema::SchemaVersion;

/// Errors that abort a manifest build or an artifact operation.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// The discovery adapter could not produce a complete snapshot.
    #[error("topology discovery failed")]
    Discovery(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// No schema descriptor exists for the requested version.
    #[error("schema version {0} not found")]
    SchemaNotFound(SchemaVersion),

    /// Two manifests cannot be compared across schema majors.
    #[error("schema incompatible")]
    SchemaIncompatible(#[from] IncompatibleSchema),

    /// A concurrent writer advanced the lineage first.
    #[error("version conflict on lineage `{lineage}`: expected sequence {expected}, found {found}")]
    VersionConflict {
        lineage: String,
        expected: u64,
        found: u64,
    },

    /// A binary manifest could not be decoded.
    #[error("manifest codec error")]
    Codec(#[from] CodecError),

    /// A JSON projection could not be produced or read.
    #[error("manifest projection error")]
    Projection(#[from] ProjectionError),

    /// A persistence or file-system failure.
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl MapError {
    /// Whether the error is a lineage race that may be retried.
    #[must_use]
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_version_conflict_with_sequences() {
        let err = MapError::VersionConflict {
            lineage: "home".to_string(),
            expected: 4,
            found: 5,
        };
        assert_eq!(
            err.to_string(),
            "version conflict on lineage `home`: expected sequence 4, found 5"
        );
        assert!(err.is_version_conflict());
    }

    #[test]
    fn should_display_schema_not_found() {
        let err = MapError::SchemaNotFound(SchemaVersion::new(2, 1));
        assert_eq!(err.to_string(), "schema version 2.1 not found");
        assert!(!err.is_version_conflict());
    }

    #[test]
    fn should_convert_codec_error() {
        let err: MapError = CodecError::BadMagic.into();
        assert!(matches!(err, MapError::Codec(CodecError::BadMagic)));
    }
}
