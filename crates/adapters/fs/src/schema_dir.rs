//! Schema descriptors loaded from a directory of TOML files.
//!
//! A descriptor for version `M.m` lives in `schema-vM.m.toml`:
//!
//! ```toml
//! version = "1.1"
//! warn_on_unknown_domain = true
//!
//! [domains.climate]
//! required_attributes = ["hvac_modes"]
//!
//! [domains.climate.capabilities]
//! target_temperature = ["min_temp", "max_temp"]
//! ```

use std::path::{Path, PathBuf};

use topomap_app::ports::SchemaSource;
use topomap_domain::error::MapError;
use topomap_domain::schema::{SchemaDescriptor, SchemaVersion};

use crate::error::FsError;

/// File name of the descriptor for `version`.
#[must_use]
pub fn schema_file_name(version: SchemaVersion) -> String {
    format!("schema-v{}.{}.toml", version.major, version.minor)
}

/// Schema source reading descriptors from one directory.
///
/// Version 1.0 falls back to the built-in descriptor when the directory has
/// no file for it.
#[derive(Debug, Clone)]
pub struct SchemaDirectory {
    dir: PathBuf,
}

impl SchemaDirectory {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn read(&self, version: SchemaVersion) -> Result<Option<SchemaDescriptor>, FsError> {
        let path = self.dir.join(schema_file_name(version));
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(FsError::io(&path)(err)),
        };
        let descriptor = parse(&path, &content)?;
        if descriptor.version != version {
            return Err(FsError::SchemaVersionMismatch {
                path,
                expected: version,
                found: descriptor.version,
            });
        }
        Ok(Some(descriptor))
    }
}

fn parse(path: &Path, content: &str) -> Result<SchemaDescriptor, FsError> {
    toml::from_str(content).map_err(|source| FsError::Toml {
        path: path.to_path_buf(),
        source,
    })
}

impl SchemaSource for SchemaDirectory {
    async fn load_schema(&self, version: SchemaVersion) -> Result<SchemaDescriptor, MapError> {
        match self.read(version).await? {
            Some(descriptor) => {
                tracing::debug!(dir = %self.dir.display(), %version, "schema loaded from file");
                Ok(descriptor)
            }
            None if version == SchemaVersion::V1 => Ok(SchemaDescriptor::builtin()),
            None => Err(MapError::SchemaNotFound(version)),
        }
    }
}
