//! File-system adapter error type.

use std::path::{Path, PathBuf};

use topomap_domain::codec::CodecError;
use topomap_domain::error::MapError;
use topomap_domain::projection::ProjectionError;
use topomap_domain::schema::SchemaVersion;

/// Errors originating from the file-system adapters.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("I/O error on `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in `{}`", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid TOML in `{}`", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A schema file declares a different version than its name.
    #[error("`{}` declares schema version {found}, expected {expected}", path.display())]
    SchemaVersionMismatch {
        path: PathBuf,
        expected: SchemaVersion,
        found: SchemaVersion,
    },

    #[error("manifest codec error")]
    Codec(#[from] CodecError),

    #[error("manifest projection error")]
    Projection(#[from] ProjectionError),
}

impl FsError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl From<FsError> for MapError {
    fn from(err: FsError) -> Self {
        match err {
            FsError::Codec(err) => Self::Codec(err),
            FsError::Projection(err) => Self::Projection(err),
            other => Self::Storage(Box::new(other)),
        }
    }
}
