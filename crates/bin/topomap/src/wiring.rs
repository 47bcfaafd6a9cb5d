//! Runtime selection between adapters implementing the same port.

use std::path::PathBuf;

use topomap_adapter_builtin::{BuiltinSchemaSource, DemoDiscovery};
use topomap_adapter_fs::{SchemaDirectory, SnapshotFileDiscovery};
use topomap_app::ports::{DiscoveryAdapter, SchemaSource};
use topomap_domain::error::MapError;
use topomap_domain::schema::{SchemaDescriptor, SchemaVersion};
use topomap_domain::topology::RawTopology;

/// Where the topology comes from.
pub enum Discovery {
    Demo(DemoDiscovery),
    Snapshot(SnapshotFileDiscovery),
}

impl Discovery {
    /// A snapshot file when given, the demo home otherwise.
    #[must_use]
    pub fn select(snapshot: Option<PathBuf>) -> Self {
        match snapshot {
            Some(path) => Self::Snapshot(SnapshotFileDiscovery::new(path)),
            None => Self::Demo(DemoDiscovery::default()),
        }
    }
}

impl DiscoveryAdapter for Discovery {
    fn name(&self) -> &str {
        match self {
            Self::Demo(inner) => inner.name(),
            Self::Snapshot(inner) => inner.name(),
        }
    }

    async fn fetch_topology(&self) -> Result<RawTopology, MapError> {
        match self {
            Self::Demo(inner) => inner.fetch_topology().await,
            Self::Snapshot(inner) => inner.fetch_topology().await,
        }
    }
}

/// Where schema descriptors come from.
pub enum Schemas {
    Builtin(BuiltinSchemaSource),
    Directory(SchemaDirectory),
}

impl Schemas {
    /// A schema directory when configured, the built-in registry otherwise.
    #[must_use]
    pub fn select(dir: Option<PathBuf>) -> Self {
        match dir {
            Some(dir) => Self::Directory(SchemaDirectory::new(dir)),
            None => Self::Builtin(BuiltinSchemaSource::default()),
        }
    }
}

impl SchemaSource for Schemas {
    async fn load_schema(&self, version: SchemaVersion) -> Result<SchemaDescriptor, MapError> {
        match self {
            Self::Builtin(inner) => inner.load_schema(version).await,
            Self::Directory(inner) => inner.load_schema(version).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn should_select_demo_when_no_snapshot_is_given() {
        let discovery = Discovery::select(None);
        assert_eq!(discovery.name(), "demo");
        assert!(!discovery.fetch_topology().await.unwrap().is_empty());
    }

    #[test]
    fn should_select_snapshot_when_path_is_given() {
        let discovery = Discovery::select(Some(PathBuf::from("snapshot.json")));
        assert_eq!(discovery.name(), "snapshot");
    }

    #[tokio::test]
    async fn should_use_builtin_schemas_when_no_directory_is_configured() {
        let schemas = Schemas::select(None);
        assert!(schemas.load_schema(SchemaVersion::V1).await.is_ok());
        assert!(matches!(
            schemas.load_schema(SchemaVersion::new(5, 0)).await,
            Err(MapError::SchemaNotFound(_))
        ));
    }
}
