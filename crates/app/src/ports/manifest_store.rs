//! Manifest store port: append-only persistence of manifest generations.

use std::future::Future;
use std::sync::Arc;

use topomap_domain::error::MapError;
use topomap_domain::manifest::Manifest;

/// Persisted manifests keyed by lineage and sequence.
///
/// Generations are immutable: a store never overwrites or deletes one.
pub trait ManifestStore: Send + Sync {
    /// The generation with the highest sequence, if any.
    fn latest(
        &self,
        lineage: &str,
    ) -> impl Future<Output = Result<Option<Manifest>, MapError>> + Send;

    /// Append the next generation.
    ///
    /// The manifest's sequence must be exactly one past the current latest
    /// (or `1` for an empty lineage); otherwise the store rejects it with
    /// [`MapError::VersionConflict`] and writes nothing.
    fn put(
        &self,
        lineage: &str,
        manifest: &Manifest,
    ) -> impl Future<Output = Result<(), MapError>> + Send;
}

impl<T: ManifestStore> ManifestStore for Arc<T> {
    fn latest(
        &self,
        lineage: &str,
    ) -> impl Future<Output = Result<Option<Manifest>, MapError>> + Send {
        (**self).latest(lineage)
    }

    fn put(
        &self,
        lineage: &str,
        manifest: &Manifest,
    ) -> impl Future<Output = Result<(), MapError>> + Send {
        (**self).put(lineage, manifest)
    }
}
