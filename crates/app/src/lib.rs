//! # topomap-app
//!
//! Application layer: the build pipeline and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `DiscoveryAdapter`: fetch one complete topology snapshot
//!   - `SchemaSource`: load a schema descriptor by version
//!   - `ManifestStore`: latest generation per lineage, append the next one
//! - Provide the **lineage lock** serializing version assignment per lineage
//! - Orchestrate discovery → normalize → validate → build → persist in
//!   `BuildService`, without knowing *how* IO works
//!
//! ## Dependency rule
//! Depends on `topomap-domain` only (plus `tokio::sync` for the lineage lock).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod lineage;
pub mod ports;
pub mod services;
