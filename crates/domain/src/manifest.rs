//! Canonical manifest: the immutable, versioned output of a build.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::area::Area;
use crate::codec::{self, CodecError};
use crate::device::Device;
use crate::entity::Entity;
use crate::id::{AreaId, DeviceId, EntityId};
use crate::normalize::NormalizedGraph;
use crate::schema::SchemaVersion;
use crate::service::Service;
use crate::time::Timestamp;

/// How much a build changed the manifest content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeScope {
    None,
    Patch,
    Minor,
    Major,
}

impl fmt::Display for ChangeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Patch => f.write_str("patch"),
            Self::Minor => f.write_str("minor"),
            Self::Major => f.write_str("major"),
        }
    }
}

/// Manifest version: a monotonic sequence plus a semantic component.
///
/// The sequence is the lineage counter the store orders by; the semantic
/// part tells consumers what kind of change happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManifestVersion {
    pub sequence: u64,
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl ManifestVersion {
    /// Version of the first manifest of a lineage.
    pub const INITIAL: Self = Self {
        sequence: 1,
        major: 1,
        minor: 0,
        patch: 0,
    };

    /// Next version for a change of the given scope.
    #[must_use]
    pub fn bump(self, scope: ChangeScope) -> Self {
        let sequence = self.sequence + 1;
        match scope {
            ChangeScope::None => self,
            ChangeScope::Patch => Self {
                sequence,
                patch: self.patch + 1,
                ..self
            },
            ChangeScope::Minor => Self {
                sequence,
                minor: self.minor + 1,
                patch: 0,
                ..self
            },
            ChangeScope::Major => Self {
                sequence,
                major: self.major + 1,
                minor: 0,
                patch: 0,
            },
        }
    }

    /// `major.minor.patch`.
    #[must_use]
    pub fn semver(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl fmt::Display for ManifestVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}+{}",
            self.major, self.minor, self.patch, self.sequence
        )
    }
}

/// Hex SHA-256 content checksum.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(String);

impl Checksum {
    pub(crate) fn from_hex(hex: String) -> Self {
        Self(hex)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A canonical manifest.
///
/// Entities, devices and areas are sorted by synthetic id without
/// duplicates; services are sorted by `(domain, name)`. The checksum covers
/// only those four sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub lineage: String,
    pub version: ManifestVersion,
    pub schema_version: SchemaVersion,
    pub generated_at: Timestamp,
    pub entities: Vec<Entity>,
    pub devices: Vec<Device>,
    pub areas: Vec<Area>,
    #[serde(default)]
    pub services: Vec<Service>,
    pub checksum: Checksum,
}

impl Manifest {
    /// Assemble a manifest from a graph, computing its checksum.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when an item cannot be encoded.
    pub fn assemble(
        lineage: impl Into<String>,
        version: ManifestVersion,
        schema_version: SchemaVersion,
        generated_at: Timestamp,
        graph: NormalizedGraph,
    ) -> Result<Self, CodecError> {
        let entities: Vec<Entity> = graph.entities.into_values().collect();
        let devices: Vec<Device> = graph.devices.into_values().collect();
        let areas: Vec<Area> = graph.areas.into_values().collect();
        let mut services: Vec<Service> = graph.services.into_values().collect();
        services.sort_by(|a, b| (&a.domain, &a.name).cmp(&(&b.domain, &b.name)));
        let checksum = codec::content_checksum(&entities, &devices, &areas, &services)?;
        Ok(Self {
            lineage: lineage.into(),
            version,
            schema_version,
            generated_at,
            entities,
            devices,
            areas,
            services,
            checksum,
        })
    }

    #[must_use]
    pub fn entity(&self, id: &EntityId) -> Option<&Entity> {
        self.entities
            .binary_search_by(|entity| entity.id.cmp(id))
            .ok()
            .map(|index| &self.entities[index])
    }

    #[must_use]
    pub fn device(&self, id: &DeviceId) -> Option<&Device> {
        self.devices
            .binary_search_by(|device| device.id.cmp(id))
            .ok()
            .map(|index| &self.devices[index])
    }

    #[must_use]
    pub fn area(&self, id: &AreaId) -> Option<&Area> {
        self.areas
            .binary_search_by(|area| area.id.cmp(id))
            .ok()
            .map(|index| &self.areas[index])
    }

    #[must_use]
    pub fn service(&self, domain: &str, name: &str) -> Option<&Service> {
        self.services
            .binary_search_by(|service| (service.domain.as_str(), service.name.as_str()).cmp(&(domain, name)))
            .ok()
            .map(|index| &self.services[index])
    }

    /// Recompute the checksum from the current content.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when an item cannot be encoded.
    pub fn recompute_checksum(&self) -> Result<Checksum, CodecError> {
        codec::content_checksum(&self.entities, &self.devices, &self.areas, &self.services)
    }

    /// Whether the recorded checksum matches the content.
    #[must_use]
    pub fn verify_checksum(&self) -> bool {
        self.recompute_checksum()
            .is_ok_and(|checksum| checksum == self.checksum)
    }

    /// Whether every set is strictly sorted by id.
    #[must_use]
    pub fn is_canonical(&self) -> bool {
        self.entities.windows(2).all(|w| w[0].id < w[1].id)
            && self.devices.windows(2).all(|w| w[0].id < w[1].id)
            && self.areas.windows(2).all(|w| w[0].id < w[1].id)
            && self
                .services
                .windows(2)
                .all(|w| (&w[0].domain, &w[0].name) < (&w[1].domain, &w[1].name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::now;

    fn graph() -> NormalizedGraph {
        let mut graph = NormalizedGraph::default();
        for uid in ["a", "b", "c"] {
            let entity = Entity::new("switch", uid);
            graph.entities.insert(entity.id.clone(), entity);
        }
        let area = Area::new("hall", "Hall");
        graph.areas.insert(area.id.clone(), area);
        for service in [Service::new("switch", "turn_on"), Service::new("switch", "toggle")] {
            graph.services.insert(service.key(), service);
        }
        graph
    }

    #[test]
    fn should_start_lineage_at_one_dot_zero() {
        assert_eq!(ManifestVersion::INITIAL.semver(), "1.0.0");
        assert_eq!(ManifestVersion::INITIAL.sequence, 1);
    }

    #[test]
    fn should_reset_lower_components_when_bumping() {
        let v = ManifestVersion {
            sequence: 4,
            major: 1,
            minor: 2,
            patch: 3,
        };
        assert_eq!(v.bump(ChangeScope::Patch).semver(), "1.2.4");
        assert_eq!(v.bump(ChangeScope::Minor).semver(), "1.3.0");
        assert_eq!(v.bump(ChangeScope::Major).semver(), "2.0.0");
        assert_eq!(v.bump(ChangeScope::Major).sequence, 5);
        assert_eq!(v.bump(ChangeScope::None), v);
    }

    #[test]
    fn should_display_semver_with_sequence() {
        let v = ManifestVersion::INITIAL.bump(ChangeScope::Minor);
        assert_eq!(v.to_string(), "1.1.0+2");
    }

    #[test]
    fn should_order_change_scopes_by_severity() {
        assert!(ChangeScope::Major > ChangeScope::Minor);
        assert!(ChangeScope::Minor > ChangeScope::Patch);
        assert!(ChangeScope::Patch > ChangeScope::None);
    }

    #[test]
    fn should_assemble_sorted_manifest_with_valid_checksum() {
        let manifest = Manifest::assemble(
            "home",
            ManifestVersion::INITIAL,
            SchemaVersion::V1,
            now(),
            graph(),
        )
        .unwrap();
        assert!(manifest.is_canonical());
        assert!(manifest.verify_checksum());
        assert_eq!(manifest.checksum.as_str().len(), 64);
        assert_eq!(manifest.checksum.short().len(), 12);
    }

    #[test]
    fn should_find_items_by_id() {
        let manifest = Manifest::assemble(
            "home",
            ManifestVersion::INITIAL,
            SchemaVersion::V1,
            now(),
            graph(),
        )
        .unwrap();
        assert!(manifest.entity(&EntityId::for_entity("switch", "b")).is_some());
        assert!(manifest.entity(&EntityId::for_entity("switch", "z")).is_none());
        assert!(manifest.area(&AreaId::for_area("hall")).is_some());
        assert!(manifest.device(&DeviceId::for_device("hall")).is_none());
        assert!(manifest.service("switch", "toggle").is_some());
        assert!(manifest.service("light", "toggle").is_none());
    }

    #[test]
    fn should_sort_services_by_domain_then_name() {
        let manifest = Manifest::assemble(
            "home",
            ManifestVersion::INITIAL,
            SchemaVersion::V1,
            now(),
            graph(),
        )
        .unwrap();
        let keys: Vec<String> = manifest.services.iter().map(Service::key).collect();
        assert_eq!(keys, vec!["switch.toggle", "switch.turn_on"]);

        let mut shuffled = manifest;
        shuffled.services.reverse();
        assert!(!shuffled.is_canonical());
    }

    #[test]
    fn should_not_depend_on_lineage_version_or_time_for_checksum() {
        let a = Manifest::assemble("a", ManifestVersion::INITIAL, SchemaVersion::V1, now(), graph())
            .unwrap();
        let b = Manifest::assemble(
            "b",
            ManifestVersion::INITIAL.bump(ChangeScope::Major),
            SchemaVersion::new(2, 0),
            now(),
            graph(),
        )
        .unwrap();
        assert_eq!(a.checksum, b.checksum);
    }

    #[test]
    fn should_detect_tampered_content() {
        let mut manifest = Manifest::assemble(
            "home",
            ManifestVersion::INITIAL,
            SchemaVersion::V1,
            now(),
            graph(),
        )
        .unwrap();
        manifest.entities[0].name = Some("renamed".to_string());
        assert!(!manifest.verify_checksum());
    }
}
