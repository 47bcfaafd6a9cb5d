//! Lock file pinning a manifest generation and its platform-key mapping.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::descriptor::FieldKind;
use crate::id::EntityId;
use crate::manifest::{Checksum, Manifest};
use crate::projection::ProjectionError;
use crate::schema::SchemaVersion;
use crate::time::Timestamp;

/// Current lock file layout.
pub const LOCK_SCHEMA_V1: u32 = 1;

/// Summary of a manifest that consumers can pin against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestLock {
    pub schema: u32,
    pub lineage: String,
    pub sequence: u64,
    /// Semantic version, `major.minor.patch`.
    pub version: String,
    pub schema_version: SchemaVersion,
    pub checksum: Checksum,
    pub generated_at: Timestamp,
    /// Platform key (`domain.object`) to synthetic id.
    pub entity_map: BTreeMap<String, EntityId>,
    /// Service key (`domain.name`) to the digest of its call signature.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub service_sig: BTreeMap<String, String>,
    /// `domain.attribute` to every enum value any entity of the domain accepts.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attr_enums: BTreeMap<String, Vec<String>>,
}

impl ManifestLock {
    #[must_use]
    pub fn from_manifest(manifest: &Manifest) -> Self {
        Self {
            schema: LOCK_SCHEMA_V1,
            lineage: manifest.lineage.clone(),
            sequence: manifest.version.sequence,
            version: manifest.version.semver(),
            schema_version: manifest.schema_version,
            checksum: manifest.checksum.clone(),
            generated_at: manifest.generated_at,
            entity_map: entity_map(manifest),
            service_sig: service_signatures(manifest),
            attr_enums: attribute_enums(manifest),
        }
    }

    /// # Errors
    ///
    /// Returns [`ProjectionError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String, ProjectionError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// # Errors
    ///
    /// Returns [`ProjectionError::Json`] when the input is not a lock file.
    pub fn from_json(json: &str) -> Result<Self, ProjectionError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Platform key to synthetic id for every entity of a manifest.
#[must_use]
pub fn entity_map(manifest: &Manifest) -> BTreeMap<String, EntityId> {
    manifest
        .entities
        .iter()
        .map(|entity| (entity.platform_key(), entity.id.clone()))
        .collect()
}

/// Service key to signature digest.
#[must_use]
pub fn service_signatures(manifest: &Manifest) -> BTreeMap<String, String> {
    manifest
        .services
        .iter()
        .map(|service| (service.key(), service.signature_digest()))
        .collect()
}

/// Union of enum descriptor values per `domain.attribute`, sorted.
#[must_use]
pub fn attribute_enums(manifest: &Manifest) -> BTreeMap<String, Vec<String>> {
    let mut enums: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
    for entity in &manifest.entities {
        for (name, descriptor) in &entity.descriptors {
            if descriptor.kind != FieldKind::Enum {
                continue;
            }
            enums
                .entry(format!("{}.{name}", entity.domain))
                .or_default()
                .extend(descriptor.values.iter().map(String::as_str));
        }
    }
    enums
        .into_iter()
        .map(|(key, values)| (key, values.into_iter().map(str::to_string).collect()))
        .collect()
}
