//! Discovery port: where raw topologies come from.
//!
//! A discovery adapter bridges the automation platform (REST, websocket, a
//! snapshot file, a built-in demo) into the engine. Whatever the transport,
//! it hands over one complete snapshot or fails as a whole.

use std::future::Future;
use std::sync::Arc;

use topomap_domain::error::MapError;
use topomap_domain::topology::RawTopology;

/// Source of complete topology snapshots.
pub trait DiscoveryAdapter: Send + Sync {
    /// Short name for logs (e.g. `"demo"`).
    fn name(&self) -> &str;

    /// Fetch one atomic snapshot.
    ///
    /// Timeouts and connectivity failures surface as
    /// [`MapError::Discovery`]; no partial topology is ever returned.
    fn fetch_topology(&self) -> impl Future<Output = Result<RawTopology, MapError>> + Send;
}

impl<T: DiscoveryAdapter> DiscoveryAdapter for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch_topology(&self) -> impl Future<Output = Result<RawTopology, MapError>> + Send {
        (**self).fetch_topology()
    }
}
