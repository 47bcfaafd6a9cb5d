//! Outbound ports of the manifest pipeline.
//!
//! The build service only ever talks to these traits. Adapter crates
//! implement them and the binary picks which implementation to inject.

pub mod discovery;
pub mod manifest_store;
pub mod schema_source;

pub use discovery::DiscoveryAdapter;
pub use manifest_store::ManifestStore;
pub use schema_source::SchemaSource;
