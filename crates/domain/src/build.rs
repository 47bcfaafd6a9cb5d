//! Manifest builder: validated graph plus previous generation in, next
//! generation out.

use crate::codec::CodecError;
use crate::diff;
use crate::manifest::{ChangeScope, Manifest, ManifestVersion};
use crate::time::Timestamp;
use crate::validate::ValidatedGraph;

/// Result of a build.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    /// A new generation. The first manifest of a lineage reports `Major`.
    Created {
        manifest: Manifest,
        scope: ChangeScope,
    },
    /// Nothing changed; this is the previous manifest, untouched.
    Unchanged(Manifest),
}

impl BuildOutcome {
    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        match self {
            Self::Created { manifest, .. } | Self::Unchanged(manifest) => manifest,
        }
    }

    #[must_use]
    pub fn into_manifest(self) -> Manifest {
        match self {
            Self::Created { manifest, .. } | Self::Unchanged(manifest) => manifest,
        }
    }

    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged(_))
    }

    #[must_use]
    pub fn scope(&self) -> ChangeScope {
        match self {
            Self::Created { scope, .. } => *scope,
            Self::Unchanged(_) => ChangeScope::None,
        }
    }
}

/// Build the next manifest of a lineage.
///
/// The graph is taken as validated: whatever entities it still holds,
/// rejected ones included, go into the manifest.
///
/// # Errors
///
/// Returns [`CodecError`] when the content cannot be encoded for the
/// checksum.
pub fn build(
    validated: &ValidatedGraph,
    previous: Option<&Manifest>,
    lineage: &str,
    generated_at: Timestamp,
) -> Result<BuildOutcome, CodecError> {
    let mut candidate = Manifest::assemble(
        lineage,
        ManifestVersion::INITIAL,
        validated.schema_version,
        generated_at,
        validated.graph.clone(),
    )?;

    let Some(previous) = previous else {
        return Ok(BuildOutcome::Created {
            manifest: candidate,
            scope: ChangeScope::Major,
        });
    };

    let mut scope = diff::diff_content(previous, &candidate).change_scope();
    if !previous
        .schema_version
        .is_compatible_with(candidate.schema_version)
    {
        scope = ChangeScope::Major;
    }
    if scope == ChangeScope::None {
        if previous.schema_version == candidate.schema_version {
            return Ok(BuildOutcome::Unchanged(previous.clone()));
        }
        scope = ChangeScope::Patch;
    }

    candidate.version = previous.version.bump(scope);
    Ok(BuildOutcome::Created {
        manifest: candidate,
        scope,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::schema::{SchemaDescriptor, SchemaVersion};
    use crate::time::now;
    use crate::topology::{RawArea, RawDevice, RawEntity, RawService, RawTopology};
    use crate::validate::{ValidationMode, validate};

    fn topology() -> RawTopology {
        RawTopology {
            entities: vec![
                RawEntity::new("light", "porch")
                    .with_device("hue")
                    .with_attribute("brightness", 10_i64)
                    .with_capability("brightness"),
                RawEntity::new("switch", "pump").with_area("garden"),
            ],
            devices: vec![RawDevice::new("hue", "Hue").with_area("garden")],
            areas: vec![RawArea::new("garden", "Garden")],
            services: vec![RawService::new("switch", "turn_on")],
        }
    }

    fn run(topology: &RawTopology, previous: Option<&Manifest>) -> BuildOutcome {
        run_with(topology, previous, &SchemaDescriptor::builtin())
    }

    fn run_with(
        topology: &RawTopology,
        previous: Option<&Manifest>,
        schema: &SchemaDescriptor,
    ) -> BuildOutcome {
        let validated = validate(normalize(topology), schema, ValidationMode::Strict);
        build(&validated, previous, "home", now()).unwrap()
    }

    #[test]
    fn should_create_initial_version_when_lineage_is_new() {
        let outcome = run(&topology(), None);
        let manifest = outcome.manifest();
        assert_eq!(manifest.version, ManifestVersion::INITIAL);
        assert_eq!(manifest.lineage, "home");
        assert_eq!(manifest.entities.len(), 2);
        assert!(manifest.verify_checksum());
    }

    #[test]
    fn should_return_previous_manifest_when_nothing_changed() {
        let first = run(&topology(), None).into_manifest();
        let second = run(&topology(), Some(&first));
        assert!(second.is_unchanged());
        assert_eq!(second.manifest(), &first);
        assert_eq!(second.scope(), ChangeScope::None);
    }

    #[test]
    fn should_bump_minor_when_entity_added() {
        let first = run(&topology(), None).into_manifest();
        let mut grown = topology();
        grown.entities.push(RawEntity::new("sensor", "rain").with_area("garden"));
        let second = run(&grown, Some(&first));
        assert_eq!(second.scope(), ChangeScope::Minor);
        assert_eq!(second.manifest().version.semver(), "1.1.0");
        assert_eq!(second.manifest().version.sequence, 2);
    }

    #[test]
    fn should_bump_major_when_entity_removed() {
        let first = run(&topology(), None).into_manifest();
        let mut shrunk = topology();
        shrunk.entities.pop();
        let second = run(&shrunk, Some(&first));
        assert_eq!(second.manifest().version.semver(), "2.0.0");
    }

    #[test]
    fn should_bump_patch_when_only_attributes_change() {
        let first = run(&topology(), None).into_manifest();
        let mut edited = topology();
        edited.entities[0] = edited.entities[0].clone().with_attribute("brightness", 99_i64);
        let second = run(&edited, Some(&first));
        assert_eq!(second.manifest().version.semver(), "1.0.1");
        assert_ne!(second.manifest().checksum, first.checksum);
    }

    #[test]
    fn should_force_major_when_schema_major_changes() {
        let first = run(&topology(), None).into_manifest();
        let mut schema = SchemaDescriptor::builtin();
        schema.version = SchemaVersion::new(2, 0);
        let second = run_with(&topology(), Some(&first), &schema);
        assert_eq!(second.scope(), ChangeScope::Major);
        assert_eq!(second.manifest().checksum, first.checksum);
    }

    #[test]
    fn should_bump_patch_when_only_schema_minor_changes() {
        let first = run(&topology(), None).into_manifest();
        let mut schema = SchemaDescriptor::builtin();
        schema.version = SchemaVersion::new(1, 1);
        let second = run_with(&topology(), Some(&first), &schema);
        assert_eq!(second.scope(), ChangeScope::Patch);
        assert_eq!(second.manifest().schema_version, SchemaVersion::new(1, 1));
    }

    #[test]
    fn should_keep_rejected_entities_when_graph_was_validated_leniently() {
        let topology = RawTopology {
            entities: vec![RawEntity::new("climate", "attic")],
            ..RawTopology::default()
        };
        let validated = validate(
            normalize(&topology),
            &SchemaDescriptor::builtin(),
            ValidationMode::Lenient,
        );
        let outcome = build(&validated, None, "home", now()).unwrap();
        assert_eq!(outcome.manifest().entities.len(), 1);
        assert!(outcome.manifest().entities[0].status.is_rejected());
    }
}
