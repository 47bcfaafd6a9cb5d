//! `SQLite` implementation of [`ManifestStore`].

use std::future::Future;

use sqlx::SqlitePool;

use topomap_app::ports::ManifestStore;
use topomap_domain::codec;
use topomap_domain::error::MapError;
use topomap_domain::manifest::Manifest;

use crate::error::StorageError;

const SELECT_LATEST: &str =
    "SELECT payload FROM manifests WHERE lineage = ? ORDER BY sequence DESC LIMIT 1";
const SELECT_MAX_SEQUENCE: &str = "SELECT MAX(sequence) FROM manifests WHERE lineage = ?";
const INSERT: &str = "INSERT INTO manifests (lineage, sequence, version, schema_version, checksum, generated_at, payload) VALUES (?, ?, ?, ?, ?, ?, ?)";

/// `SQLite`-backed, append-only manifest store.
pub struct SqliteManifestStore {
    pool: SqlitePool,
}

impl SqliteManifestStore {
    /// Create a new store using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn to_column(sequence: u64) -> Result<i64, StorageError> {
    i64::try_from(sequence).map_err(|_| StorageError::SequenceOutOfRange(sequence))
}

fn from_column(sequence: i64) -> u64 {
    u64::try_from(sequence).unwrap_or_default()
}

impl ManifestStore for SqliteManifestStore {
    fn latest(
        &self,
        lineage: &str,
    ) -> impl Future<Output = Result<Option<Manifest>, MapError>> + Send {
        let pool = self.pool.clone();
        let lineage = lineage.to_string();
        async move {
            let row: Option<(Vec<u8>,)> = sqlx::query_as(SELECT_LATEST)
                .bind(&lineage)
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            let Some((payload,)) = row else {
                return Ok(None);
            };
            let manifest = codec::decode(&payload).map_err(StorageError::from)?;
            Ok(Some(manifest))
        }
    }

    fn put(
        &self,
        lineage: &str,
        manifest: &Manifest,
    ) -> impl Future<Output = Result<(), MapError>> + Send {
        let pool = self.pool.clone();
        let lineage = lineage.to_string();
        let encoded = codec::encode(manifest);
        let sequence = manifest.version.sequence;
        let version = manifest.version.semver();
        let schema_version = manifest.schema_version.to_string();
        let checksum = manifest.checksum.to_string();
        let generated_at = manifest.generated_at.to_rfc3339();
        async move {
            let payload = encoded?;
            let column = to_column(sequence)?;

            let mut tx = pool.begin().await.map_err(StorageError::from)?;

            let (current,): (Option<i64>,) = sqlx::query_as(SELECT_MAX_SEQUENCE)
                .bind(&lineage)
                .fetch_one(&mut *tx)
                .await
                .map_err(StorageError::from)?;
            let current = current.map_or(0, from_column);
            if current + 1 != sequence {
                return Err(MapError::VersionConflict {
                    lineage,
                    expected: sequence.saturating_sub(1),
                    found: current,
                });
            }

            let inserted = sqlx::query(INSERT)
                .bind(&lineage)
                .bind(column)
                .bind(&version)
                .bind(&schema_version)
                .bind(&checksum)
                .bind(&generated_at)
                .bind(&payload)
                .execute(&mut *tx)
                .await;
            match inserted {
                Ok(_) => {}
                Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                    return Err(MapError::VersionConflict {
                        lineage,
                        expected: sequence.saturating_sub(1),
                        found: sequence,
                    });
                }
                Err(err) => return Err(StorageError::from(err).into()),
            }

            tx.commit().await.map_err(StorageError::from)?;
            tracing::debug!(%lineage, sequence, %version, "manifest generation stored");
            Ok(())
        }
    }
}
