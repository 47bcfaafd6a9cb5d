//! Schema source backed by descriptors compiled into the binary.

use topomap_app::ports::SchemaSource;
use topomap_domain::error::MapError;
use topomap_domain::schema::{SchemaDescriptor, SchemaVersion};

/// In-memory schema registry, seeded with the built-in 1.0 descriptor.
#[derive(Debug, Clone)]
pub struct BuiltinSchemaSource {
    descriptors: Vec<SchemaDescriptor>,
}

impl Default for BuiltinSchemaSource {
    fn default() -> Self {
        Self {
            descriptors: vec![SchemaDescriptor::builtin()],
        }
    }
}

impl BuiltinSchemaSource {
    /// Register another descriptor, replacing any with the same version.
    #[must_use]
    pub fn with_descriptor(mut self, descriptor: SchemaDescriptor) -> Self {
        self.descriptors
            .retain(|existing| existing.version != descriptor.version);
        self.descriptors.push(descriptor);
        self
    }
}

impl SchemaSource for BuiltinSchemaSource {
    async fn load_schema(&self, version: SchemaVersion) -> Result<SchemaDescriptor, MapError> {
        self.descriptors
            .iter()
            .find(|descriptor| descriptor.version == version)
            .cloned()
            .ok_or(MapError::SchemaNotFound(version))
    }
}
