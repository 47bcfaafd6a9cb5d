//! Discovery from a raw topology snapshot saved as JSON.

use std::path::PathBuf;

use topomap_app::ports::DiscoveryAdapter;
use topomap_domain::error::MapError;
use topomap_domain::topology::RawTopology;

use crate::error::FsError;

/// Reads one complete topology from a JSON file on every fetch.
#[derive(Debug, Clone)]
pub struct SnapshotFileDiscovery {
    path: PathBuf,
}

impl SnapshotFileDiscovery {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read(&self) -> Result<RawTopology, FsError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(FsError::io(&self.path))?;
        serde_json::from_str(&content).map_err(|source| FsError::Json {
            path: self.path.clone(),
            source,
        })
    }
}

impl DiscoveryAdapter for SnapshotFileDiscovery {
    fn name(&self) -> &str {
        "snapshot"
    }

    async fn fetch_topology(&self) -> Result<RawTopology, MapError> {
        let topology = self
            .read()
            .await
            .map_err(|err| MapError::Discovery(Box::new(err)))?;
        tracing::debug!(
            path = %self.path.display(),
            entities = topology.entities.len(),
            "snapshot loaded"
        );
        Ok(topology)
    }
}
