//! # topomap-adapter-fs
//!
//! File-system adapters.
//!
//! ## Responsibilities
//! - [`SnapshotFileDiscovery`]: read a raw topology snapshot from a JSON file
//! - [`SchemaDirectory`]: load `schema-v<major>.<minor>.toml` descriptors
//! - [`ArtifactDir`]: write and read the `manifest.bin`, `manifest.json` and
//!   `manifest.lock.json` artifacts of one generation
//! - Template loading and rendered output for the renderer
//!
//! ## Dependency rule
//! Depends on `topomap-app` (port traits) and `topomap-domain` (types).

mod artifacts;
mod error;
mod schema_dir;
mod snapshot;
mod templates;

pub use artifacts::{
    ArtifactBundle, ArtifactDir, LOCK_FILE, MANIFEST_BINARY_FILE, MANIFEST_JSON_FILE,
    load_manifest,
};
pub use error::FsError;
pub use schema_dir::{SchemaDirectory, schema_file_name};
pub use snapshot::SnapshotFileDiscovery;
pub use templates::{load_templates, output_path, write_rendered};
