//! Build service: the manifest pipeline from discovery to persistence.

use topomap_domain::build::{BuildOutcome, build};
use topomap_domain::error::MapError;
use topomap_domain::id::EntityId;
use topomap_domain::issue::SubjectKind;
use topomap_domain::normalize::normalize;
use topomap_domain::schema::SchemaVersion;
use topomap_domain::time;
use topomap_domain::validate::{ValidatedGraph, ValidationMode, ValidationReport, validate};

use crate::lineage::LineageLocks;
use crate::ports::{DiscoveryAdapter, ManifestStore, SchemaSource};

/// Parameters of one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub lineage: String,
    pub schema_version: SchemaVersion,
    pub mode: ValidationMode,
}

impl BuildRequest {
    #[must_use]
    pub fn new(lineage: impl Into<String>) -> Self {
        Self {
            lineage: lineage.into(),
            schema_version: SchemaVersion::V1,
            mode: ValidationMode::Strict,
        }
    }

    #[must_use]
    pub fn with_schema_version(mut self, schema_version: SchemaVersion) -> Self {
        self.schema_version = schema_version;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }
}

/// What a build produced, including the full issue report.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub outcome: BuildOutcome,
    pub report: ValidationReport,
    /// Entities left out in strict mode.
    pub excluded: Vec<EntityId>,
}

impl BuildReport {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.report.has_errors()
    }
}

/// Runs discovery → normalize → validate → build → persist.
pub struct BuildService<D, S, M> {
    discovery: D,
    schemas: S,
    store: M,
    locks: LineageLocks,
}

impl<D, S, M> BuildService<D, S, M>
where
    D: DiscoveryAdapter,
    S: SchemaSource,
    M: ManifestStore,
{
    /// Create a new service with its own lineage lock registry.
    pub fn new(discovery: D, schemas: S, store: M) -> Self {
        Self {
            discovery,
            schemas,
            store,
            locks: LineageLocks::new(),
        }
    }

    /// Share a lock registry with other services writing to the same store.
    #[must_use]
    pub fn with_locks(mut self, locks: LineageLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Run one build.
    ///
    /// Entity-level problems never fail the build: they are returned in the
    /// report. A version conflict is retried once with a fresh read of the
    /// latest generation.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Discovery`] or [`MapError::SchemaNotFound`] before
    /// anything is normalized, [`MapError::VersionConflict`] when the retry
    /// conflicts again, or a storage error. Nothing is persisted on error.
    #[tracing::instrument(
        skip(self, request),
        fields(
            lineage = %request.lineage,
            mode = %request.mode,
            schema = %request.schema_version,
            adapter = self.discovery.name(),
        )
    )]
    pub async fn build(&self, request: &BuildRequest) -> Result<BuildReport, MapError> {
        let topology = self.discovery.fetch_topology().await?;
        tracing::debug!(
            entities = topology.entities.len(),
            devices = topology.devices.len(),
            areas = topology.areas.len(),
            services = topology.services.len(),
            "topology fetched"
        );
        let schema = self.schemas.load_schema(request.schema_version).await?;

        let validated = validate(normalize(&topology), &schema, request.mode);
        drop(topology);
        log_rejections(&validated);

        let outcome = match self.commit(request, &validated).await {
            Err(err) if err.is_version_conflict() => {
                tracing::warn!(%err, "lineage advanced concurrently, retrying once");
                self.commit(request, &validated).await?
            }
            other => other?,
        };

        let ValidatedGraph {
            report, excluded, ..
        } = validated;
        Ok(BuildReport {
            outcome,
            report,
            excluded,
        })
    }

    async fn commit(
        &self,
        request: &BuildRequest,
        validated: &ValidatedGraph,
    ) -> Result<BuildOutcome, MapError> {
        let _guard = self.locks.acquire(&request.lineage).await;
        let previous = self.store.latest(&request.lineage).await?;
        let outcome = build(validated, previous.as_ref(), &request.lineage, time::now())?;

        match &outcome {
            BuildOutcome::Created { manifest, scope } => {
                self.store.put(&request.lineage, manifest).await?;
                tracing::info!(
                    version = %manifest.version,
                    checksum = manifest.checksum.short(),
                    %scope,
                    entities = manifest.entities.len(),
                    "manifest generation written"
                );
            }
            BuildOutcome::Unchanged(manifest) => {
                tracing::info!(
                    version = %manifest.version,
                    checksum = manifest.checksum.short(),
                    "manifest unchanged"
                );
            }
        }
        Ok(outcome)
    }
}

fn log_rejections(validated: &ValidatedGraph) {
    for (id, status) in &validated.report.statuses {
        if !status.is_rejected() {
            continue;
        }
        let codes: Vec<&str> = validated
            .report
            .issues_for(id.as_str())
            .filter(|issue| issue.subject_kind == SubjectKind::Entity && issue.is_error())
            .map(|issue| issue.code.as_str())
            .collect();
        tracing::warn!(
            entity = %id,
            codes = %codes.join(","),
            excluded = validated.excluded.contains(id),
            "entity rejected"
        );
    }
}
