//! # topomap-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter built on `sqlx`.
//!
//! ## Responsibilities
//! - Own the `SQLite` connection pool and run migrations
//! - Implement [`ManifestStore`](topomap_app::ports::ManifestStore): every
//!   generation is stored as its canonical binary encoding, keyed by
//!   lineage and sequence
//! - Enforce the single-writer rule at the database level, so two
//!   processes racing on one lineage cannot both commit the same sequence
//!
//! ## Dependency rule
//! Depends on `topomap-app` (port traits) and `topomap-domain` (types).

mod error;
mod manifest_store;
mod pool;

pub use error::StorageError;
pub use manifest_store::SqliteManifestStore;
pub use pool::{Config, Database};
