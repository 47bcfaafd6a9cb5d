//! Schema source port: loads already-compiled schema descriptors.

use std::future::Future;
use std::sync::Arc;

use topomap_domain::error::MapError;
use topomap_domain::schema::{SchemaDescriptor, SchemaVersion};

/// Lookup of schema descriptors by version.
pub trait SchemaSource: Send + Sync {
    /// Load the descriptor for `version`.
    ///
    /// Returns [`MapError::SchemaNotFound`] when no such version exists.
    fn load_schema(
        &self,
        version: SchemaVersion,
    ) -> impl Future<Output = Result<SchemaDescriptor, MapError>> + Send;
}

impl<T: SchemaSource> SchemaSource for Arc<T> {
    fn load_schema(
        &self,
        version: SchemaVersion,
    ) -> impl Future<Output = Result<SchemaDescriptor, MapError>> + Send {
        (**self).load_schema(version)
    }
}
