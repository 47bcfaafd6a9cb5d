//! Consistency check of previously written manifest artifacts.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::codec;
use crate::error::MapError;
use crate::lock::{ManifestLock, entity_map, service_signatures};
use crate::manifest::{Checksum, Manifest};
use crate::projection;

/// One inconsistency found in a set of artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerificationProblem {
    /// The recorded checksum does not match the content.
    ChecksumMismatch { recorded: Checksum, computed: Checksum },
    /// Re-encoding the decoded manifest produced different bytes.
    NonCanonicalEncoding,
    /// The JSON projection could not be read.
    ProjectionUnreadable { reason: String },
    /// The JSON projection describes a different manifest.
    ProjectionMismatch,
    LockChecksumMismatch { lock: Checksum, manifest: Checksum },
    LockVersionMismatch { lock: String, manifest: String },
    LockLineageMismatch { lock: String, manifest: String },
    /// An entity of the manifest has no lock entry.
    MissingLockEntry { key: String },
    /// A lock entry names no entity of the manifest.
    StaleLockEntry { key: String },
    /// Several entities of the manifest claim the same platform key.
    DuplicatePlatformKey { key: String },
    /// The lock pins a different call signature, or none, for a service.
    ServiceSignatureMismatch { key: String },
}

impl fmt::Display for VerificationProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChecksumMismatch { recorded, computed } => {
                write!(f, "checksum mismatch: recorded {recorded}, computed {computed}")
            }
            Self::NonCanonicalEncoding => f.write_str("binary manifest is not canonically encoded"),
            Self::ProjectionUnreadable { reason } => {
                write!(f, "JSON projection is unreadable: {reason}")
            }
            Self::ProjectionMismatch => {
                f.write_str("JSON projection does not match the binary manifest")
            }
            Self::LockChecksumMismatch { lock, manifest } => {
                write!(f, "lock checksum {lock} does not match manifest {manifest}")
            }
            Self::LockVersionMismatch { lock, manifest } => {
                write!(f, "lock version {lock} does not match manifest {manifest}")
            }
            Self::LockLineageMismatch { lock, manifest } => {
                write!(f, "lock lineage `{lock}` does not match manifest `{manifest}`")
            }
            Self::MissingLockEntry { key } => write!(f, "entity `{key}` is missing from the lock"),
            Self::StaleLockEntry { key } => write!(f, "lock entry `{key}` has no entity"),
            Self::DuplicatePlatformKey { key } => {
                write!(f, "platform key `{key}` is claimed by several entities")
            }
            Self::ServiceSignatureMismatch { key } => {
                write!(f, "service `{key}` signature differs from the lock")
            }
        }
    }
}

/// Outcome of [`verify_artifacts`].
#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub manifest: Manifest,
    pub problems: Vec<VerificationProblem>,
}

impl VerificationReport {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Re-decode a binary manifest and cross-check it against its JSON
/// projection and lock file when given.
///
/// # Errors
///
/// Returns [`MapError::Codec`] when the binary manifest cannot be decoded at
/// all; every other inconsistency is reported as a problem.
pub fn verify_artifacts(
    binary: &[u8],
    json: Option<&str>,
    lock: Option<&ManifestLock>,
) -> Result<VerificationReport, MapError> {
    let manifest = codec::decode(binary)?;
    let mut problems = Vec::new();

    let computed = manifest.recompute_checksum()?;
    if computed != manifest.checksum {
        problems.push(VerificationProblem::ChecksumMismatch {
            recorded: manifest.checksum.clone(),
            computed,
        });
    }
    if codec::encode(&manifest)? != binary {
        problems.push(VerificationProblem::NonCanonicalEncoding);
    }
    check_platform_keys(&manifest, &mut problems);

    if let Some(json) = json {
        match projection::from_json(json) {
            Ok(projected) if projected == manifest => {}
            Ok(_) => problems.push(VerificationProblem::ProjectionMismatch),
            Err(err) => problems.push(VerificationProblem::ProjectionUnreadable {
                reason: err.to_string(),
            }),
        }
    }

    if let Some(lock) = lock {
        check_lock(&manifest, lock, &mut problems);
    }

    Ok(VerificationReport { manifest, problems })
}

fn check_platform_keys(manifest: &Manifest, problems: &mut Vec<VerificationProblem>) {
    let mut claims: BTreeMap<String, usize> = BTreeMap::new();
    for entity in &manifest.entities {
        *claims.entry(entity.platform_key()).or_default() += 1;
    }
    problems.extend(
        claims
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(key, _)| VerificationProblem::DuplicatePlatformKey { key }),
    );
}

fn check_lock(manifest: &Manifest, lock: &ManifestLock, problems: &mut Vec<VerificationProblem>) {
    if lock.checksum != manifest.checksum {
        problems.push(VerificationProblem::LockChecksumMismatch {
            lock: lock.checksum.clone(),
            manifest: manifest.checksum.clone(),
        });
    }
    let version = manifest.version.semver();
    if lock.version != version || lock.sequence != manifest.version.sequence {
        problems.push(VerificationProblem::LockVersionMismatch {
            lock: format!("{}+{}", lock.version, lock.sequence),
            manifest: manifest.version.to_string(),
        });
    }
    if lock.lineage != manifest.lineage {
        problems.push(VerificationProblem::LockLineageMismatch {
            lock: lock.lineage.clone(),
            manifest: manifest.lineage.clone(),
        });
    }

    let expected = entity_map(manifest);
    for (key, id) in &expected {
        if lock.entity_map.get(key) != Some(id) {
            problems.push(VerificationProblem::MissingLockEntry { key: key.clone() });
        }
    }
    for key in lock.entity_map.keys() {
        if !expected.contains_key(key) {
            problems.push(VerificationProblem::StaleLockEntry { key: key.clone() });
        }
    }

    let signatures = service_signatures(manifest);
    let keys: std::collections::BTreeSet<&String> =
        signatures.keys().chain(lock.service_sig.keys()).collect();
    for key in keys {
        if signatures.get(key) != lock.service_sig.get(key) {
            problems.push(VerificationProblem::ServiceSignatureMismatch { key: key.clone() });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::manifest::ManifestVersion;
    use crate::normalize::NormalizedGraph;
    use crate::schema::SchemaVersion;
    use crate::service::{Service, ServiceField};
    use crate::time::now;

    fn manifest() -> Manifest {
        let mut graph = NormalizedGraph::default();
        for entity in [Entity::new("light", "porch"), Entity::new("switch", "pump")] {
            graph.entities.insert(entity.id.clone(), entity);
        }
        Manifest::assemble("home", ManifestVersion::INITIAL, SchemaVersion::V1, now(), graph)
            .unwrap()
    }

    #[test]
    fn should_accept_consistent_artifacts() {
        let manifest = manifest();
        let binary = codec::encode(&manifest).unwrap();
        let json = projection::to_json(&manifest).unwrap();
        let lock = ManifestLock::from_manifest(&manifest);
        let report = verify_artifacts(&binary, Some(&json), Some(&lock)).unwrap();
        assert!(report.is_ok(), "{:?}", report.problems);
        assert_eq!(report.manifest, manifest);
    }

    #[test]
    fn should_report_checksum_mismatch_when_content_was_edited() {
        let mut manifest = manifest();
        manifest.entities[0].name = Some("tampered".to_string());
        let binary = codec::encode(&manifest).unwrap();
        let report = verify_artifacts(&binary, None, None).unwrap();
        assert!(matches!(
            report.problems.as_slice(),
            [VerificationProblem::ChecksumMismatch { .. }]
        ));
    }

    #[test]
    fn should_fail_when_binary_is_not_a_manifest() {
        let result = verify_artifacts(b"garbage", None, None);
        assert!(matches!(result, Err(MapError::Codec(_))));
    }

    #[test]
    fn should_report_projection_mismatch() {
        let manifest = manifest();
        let binary = codec::encode(&manifest).unwrap();
        let mut other = manifest.clone();
        other.lineage = "elsewhere".to_string();
        let json = projection::to_json(&other).unwrap();
        let report = verify_artifacts(&binary, Some(&json), None).unwrap();
        assert_eq!(report.problems, vec![VerificationProblem::ProjectionMismatch]);
    }

    #[test]
    fn should_report_unreadable_projection() {
        let binary = codec::encode(&manifest()).unwrap();
        let report = verify_artifacts(&binary, Some("not json"), None).unwrap();
        assert!(matches!(
            report.problems.as_slice(),
            [VerificationProblem::ProjectionUnreadable { .. }]
        ));
    }

    #[test]
    fn should_report_missing_and_stale_lock_entries() {
        let manifest = manifest();
        let binary = codec::encode(&manifest).unwrap();
        let mut lock = ManifestLock::from_manifest(&manifest);
        lock.entity_map.remove("light.porch");
        lock.entity_map
            .insert("light.gone".to_string(), crate::id::EntityId::for_entity("light", "gone"));
        let report = verify_artifacts(&binary, None, Some(&lock)).unwrap();
        assert_eq!(
            report.problems,
            vec![
                VerificationProblem::MissingLockEntry {
                    key: "light.porch".to_string()
                },
                VerificationProblem::StaleLockEntry {
                    key: "light.gone".to_string()
                },
            ]
        );
    }

    #[test]
    fn should_report_lock_for_other_generation() {
        let manifest = manifest();
        let binary = codec::encode(&manifest).unwrap();
        let mut lock = ManifestLock::from_manifest(&manifest);
        lock.sequence = 7;
        let report = verify_artifacts(&binary, None, Some(&lock)).unwrap();
        assert!(matches!(
            report.problems.as_slice(),
            [VerificationProblem::LockVersionMismatch { .. }]
        ));
    }

    #[test]
    fn should_report_entities_sharing_a_platform_key() {
        let mut manifest = manifest();
        manifest.entities.push(Entity::new("light", "light.porch"));
        manifest.entities.sort_by(|a, b| a.id.cmp(&b.id));
        manifest.checksum = manifest.recompute_checksum().unwrap();
        let binary = codec::encode(&manifest).unwrap();
        let report = verify_artifacts(&binary, None, None).unwrap();
        assert_eq!(
            report.problems,
            vec![VerificationProblem::DuplicatePlatformKey {
                key: "light.porch".to_string()
            }]
        );
    }

    #[test]
    fn should_report_service_signature_drift() {
        let mut manifest = manifest();
        manifest.services = vec![
            Service::new("switch", "turn_on"),
            Service::new("switch", "turn_off"),
        ];
        manifest.services.sort_by(|a, b| a.key().cmp(&b.key()));
        manifest.checksum = manifest.recompute_checksum().unwrap();
        let binary = codec::encode(&manifest).unwrap();
        let mut lock = ManifestLock::from_manifest(&manifest);
        lock.service_sig.insert(
            "switch.turn_on".to_string(),
            Service::new("switch", "turn_on")
                .with_field("delay", ServiceField::new("duration_s"))
                .signature_digest(),
        );
        lock.service_sig.remove("switch.turn_off");
        let report = verify_artifacts(&binary, None, Some(&lock)).unwrap();
        assert_eq!(
            report.problems,
            vec![
                VerificationProblem::ServiceSignatureMismatch {
                    key: "switch.turn_off".to_string()
                },
                VerificationProblem::ServiceSignatureMismatch {
                    key: "switch.turn_on".to_string()
                },
            ]
        );
    }
}
