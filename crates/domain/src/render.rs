//! Per-entity template rendering over a final manifest.
//!
//! Templates are plain text with `{{ path }}` or `{{ path | "fallback" }}`
//! placeholders. A failure is recorded per template and entity and never
//! stops the remaining work.

use std::fmt;

use serde::Serialize;

use crate::descriptor::AttributeDescriptor;
use crate::entity::Entity;
use crate::id::EntityId;
use crate::manifest::Manifest;

const TEMPLATE_EXTENSION: &str = ".tmpl";

/// A named template, optionally restricted to one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub name: String,
    pub domain: Option<String>,
    pub source: String,
}

impl Template {
    /// Build a template from its file name.
    ///
    /// `<name>.<domain>.tmpl` applies to one domain, `<name>.tmpl` to all.
    /// Returns `None` for other file names.
    #[must_use]
    pub fn from_file_name(file_name: &str, source: impl Into<String>) -> Option<Self> {
        let stem = file_name.strip_suffix(TEMPLATE_EXTENSION)?;
        if stem.is_empty() {
            return None;
        }
        let (name, domain) = match stem.rsplit_once('.') {
            Some((name, domain)) if !name.is_empty() && !domain.is_empty() => {
                (name, Some(domain.to_string()))
            }
            _ => (stem, None),
        };
        Some(Self {
            name: name.to_string(),
            domain,
            source: source.into(),
        })
    }

    /// Key used to name the template's output: `name` or `name.domain`.
    #[must_use]
    pub fn key(&self) -> String {
        match &self.domain {
            Some(domain) => format!("{}.{domain}", self.name),
            None => self.name.clone(),
        }
    }

    #[must_use]
    pub fn applies_to(&self, entity: &Entity) -> bool {
        self.domain
            .as_deref()
            .is_none_or(|domain| domain == entity.domain)
    }
}

/// Why a template could not be rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderFailure {
    /// A `{{` without a matching `}}` at the given byte offset.
    Unterminated { offset: usize },
    /// A fallback that is not a double-quoted string.
    MalformedFallback { placeholder: String },
    UnknownPath { path: String },
    /// The path is valid but has no value for this entity and no fallback.
    MissingValue { path: String },
}

impl fmt::Display for RenderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unterminated { offset } => write!(f, "unterminated placeholder at byte {offset}"),
            Self::MalformedFallback { placeholder } => {
                write!(f, "malformed fallback in `{{{{{placeholder}}}}}`")
            }
            Self::UnknownPath { path } => write!(f, "unknown path `{path}`"),
            Self::MissingValue { path } => write!(f, "no value for `{path}`"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedArtifact {
    pub template: String,
    pub entity_id: EntityId,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderError {
    pub template: String,
    /// `None` when the template itself could not be parsed.
    pub entity_id: Option<EntityId>,
    pub failure: RenderFailure,
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entity_id {
            Some(id) => write!(f, "template `{}` for {id}: {}", self.template, self.failure),
            None => write!(f, "template `{}`: {}", self.template, self.failure),
        }
    }
}

/// Everything one render pass produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderOutput {
    pub artifacts: Vec<RenderedArtifact>,
    pub errors: Vec<RenderError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    Placeholder {
        path: &'a str,
        fallback: Option<&'a str>,
    },
}

fn parse(source: &str) -> Result<Vec<Segment<'_>>, RenderFailure> {
    let mut segments = Vec::new();
    let mut rest = source;
    let mut offset = 0;
    while let Some(start) = rest.find("{{") {
        if start > 0 {
            segments.push(Segment::Literal(&rest[..start]));
        }
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            return Err(RenderFailure::Unterminated {
                offset: offset + start,
            });
        };
        let inner = &after[..end];
        let (path, fallback) = match inner.split_once('|') {
            None => (inner.trim(), None),
            Some((path, fallback)) => {
                let fallback = fallback.trim();
                let quoted = fallback
                    .strip_prefix('"')
                    .and_then(|f| f.strip_suffix('"'))
                    .filter(|f| !f.contains('"'));
                let Some(fallback) = quoted else {
                    return Err(RenderFailure::MalformedFallback {
                        placeholder: inner.to_string(),
                    });
                };
                (path.trim(), Some(fallback))
            }
        };
        segments.push(Segment::Placeholder { path, fallback });
        let consumed = start + 2 + end + 2;
        offset += consumed;
        rest = &rest[consumed..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Literal(rest));
    }
    Ok(segments)
}

fn resolve(manifest: &Manifest, entity: &Entity, path: &str) -> Result<Option<String>, RenderFailure> {
    let unknown = || RenderFailure::UnknownPath {
        path: path.to_string(),
    };
    let (scope, field) = path.split_once('.').unwrap_or((path, ""));
    let value = match (scope, field) {
        ("entity", "id") => Some(entity.id.to_string()),
        ("entity", "domain") => Some(entity.domain.clone()),
        ("entity", "platform_id") => Some(entity.platform_id.clone()),
        ("entity", "platform_key") => Some(entity.platform_key()),
        ("entity", "name") => entity.name.clone(),
        ("entity", "status") => Some(entity.status.to_string()),
        ("entity", "device_class") => entity.device_class.clone(),
        ("device", field) => {
            let device = entity.device_id.as_ref().and_then(|id| manifest.device(id));
            match field {
                "id" => entity.device_id.as_ref().map(ToString::to_string),
                "platform_id" => device.map(|d| d.platform_id.clone()),
                "name" => device.map(|d| d.name.clone()),
                "manufacturer" => device.and_then(|d| d.manufacturer.clone()),
                "model" => device.and_then(|d| d.model.clone()),
                _ => return Err(unknown()),
            }
        }
        ("area", field) => {
            let area = entity.area_id().and_then(|id| manifest.area(id));
            match field {
                "id" => entity.area_id().map(ToString::to_string),
                "platform_id" => area.map(|a| a.platform_id.clone()),
                "name" => area.map(|a| a.name.clone()),
                "source" => entity.area.as_ref().map(|a| a.source.to_string()),
                _ => return Err(unknown()),
            }
        }
        ("attributes", key) if !key.is_empty() => entity.attribute(key).map(ToString::to_string),
        ("descriptors", field) => {
            let (name, property) = field.split_once('.').ok_or_else(unknown)?;
            let descriptor = entity.descriptors.get(name);
            descriptor_property(descriptor, property).ok_or_else(unknown)?
        }
        ("capabilities", "") => Some(
            entity
                .capabilities
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(","),
        ),
        ("manifest", "lineage") => Some(manifest.lineage.clone()),
        ("manifest", "version") => Some(manifest.version.semver()),
        ("manifest", "sequence") => Some(manifest.version.sequence.to_string()),
        ("manifest", "checksum") => Some(manifest.checksum.to_string()),
        ("manifest", "schema_version") => Some(manifest.schema_version.to_string()),
        ("manifest", "generated_at") => Some(manifest.generated_at.to_rfc3339()),
        ("manifest", "services") => Some(manifest.services.len().to_string()),
        _ => return Err(unknown()),
    };
    Ok(value)
}

/// `None` for an unknown property, `Some(None)` for a known one without value.
fn descriptor_property(
    descriptor: Option<&AttributeDescriptor>,
    property: &str,
) -> Option<Option<String>> {
    let range = descriptor.and_then(|d| d.range);
    let value = match property {
        "kind" => descriptor.map(|d| d.kind.to_string()),
        "unit" => descriptor.and_then(|d| d.unit.clone()),
        "optional" => descriptor.map(|d| d.optional.to_string()),
        "values" => descriptor
            .filter(|d| !d.values.is_empty())
            .map(|d| d.values.join(",")),
        "min" => range.and_then(|r| r.min).map(|v| v.to_string()),
        "max" => range.and_then(|r| r.max).map(|v| v.to_string()),
        "step" => range.and_then(|r| r.step).map(|v| v.to_string()),
        _ => return None,
    };
    Some(value)
}

fn render_one(
    manifest: &Manifest,
    entity: &Entity,
    segments: &[Segment<'_>],
) -> Result<String, RenderFailure> {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Placeholder { path, fallback } => {
                match (resolve(manifest, entity, path)?, fallback) {
                    (Some(value), _) => out.push_str(&value),
                    (None, Some(fallback)) => out.push_str(fallback),
                    (None, None) => {
                        return Err(RenderFailure::MissingValue {
                            path: (*path).to_string(),
                        });
                    }
                }
            }
        }
    }
    Ok(out)
}

/// Render every template for every applicable, non-rejected entity.
///
/// Output is sorted by template key, then entity id.
#[must_use]
pub fn render(manifest: &Manifest, templates: &[Template]) -> RenderOutput {
    let mut output = RenderOutput::default();
    for template in templates {
        let key = template.key();
        let segments = match parse(&template.source) {
            Ok(segments) => segments,
            Err(failure) => {
                output.errors.push(RenderError {
                    template: key,
                    entity_id: None,
                    failure,
                });
                continue;
            }
        };
        for entity in &manifest.entities {
            if entity.status.is_rejected() || !template.applies_to(entity) {
                continue;
            }
            match render_one(manifest, entity, &segments) {
                Ok(content) => output.artifacts.push(RenderedArtifact {
                    template: key.clone(),
                    entity_id: entity.id.clone(),
                    content,
                }),
                Err(failure) => output.errors.push(RenderError {
                    template: key.clone(),
                    entity_id: Some(entity.id.clone()),
                    failure,
                }),
            }
        }
    }
    output
        .artifacts
        .sort_by(|a, b| (&a.template, &a.entity_id).cmp(&(&b.template, &b.entity_id)));
    output
        .errors
        .sort_by(|a, b| (&a.template, &a.entity_id).cmp(&(&b.template, &b.entity_id)));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::Area;
    use crate::descriptor::CapabilityRange;
    use crate::device::Device;
    use crate::entity::{AreaSource, ValidationStatus};
    use crate::manifest::ManifestVersion;
    use crate::normalize::NormalizedGraph;
    use crate::schema::SchemaVersion;
    use crate::time::now;

    fn manifest() -> Manifest {
        let mut graph = NormalizedGraph::default();
        let area = Area::new("kitchen", "Kitchen");
        let device = Device::new("hue", "Hue bulb").with_manufacturer("Signify");
        let light = Entity::new("light", "ceiling")
            .with_name("Ceiling")
            .with_device(device.id.clone())
            .with_area(area.id.clone(), AreaSource::Direct)
            .with_attribute("brightness", 200_i64)
            .with_capability("brightness");
        let pump = Entity::new("switch", "pump").with_device_class("outlet");
        let hall = Entity::new("climate", "hall")
            .with_area(area.id.clone(), AreaSource::Direct)
            .with_descriptor(
                "target_temp_c",
                AttributeDescriptor::number(Some("°C"))
                    .with_range(CapabilityRange::new(7.0, 30.0, 0.5)),
            )
            .with_descriptor(
                "hvac_mode",
                AttributeDescriptor::enumeration(["heat", "off"]).optional(),
            );
        let mut broken = Entity::new("light", "broken");
        broken.status = ValidationStatus::Rejected;
        graph.areas.insert(area.id.clone(), area);
        graph.devices.insert(device.id.clone(), device);
        for entity in [light, pump, hall, broken] {
            graph.entities.insert(entity.id.clone(), entity);
        }
        Manifest::assemble("home", ManifestVersion::INITIAL, SchemaVersion::V1, now(), graph)
            .unwrap()
    }

    fn template(file: &str, source: &str) -> Template {
        Template::from_file_name(file, source).unwrap()
    }

    #[test]
    fn should_parse_domain_from_file_name() {
        let scoped = template("card.light.tmpl", "");
        assert_eq!(scoped.name, "card");
        assert_eq!(scoped.domain.as_deref(), Some("light"));
        assert_eq!(scoped.key(), "card.light");
        let global = template("card.tmpl", "");
        assert!(global.domain.is_none());
        assert!(Template::from_file_name("card.txt", "").is_none());
        assert!(Template::from_file_name(".tmpl", "").is_none());
    }

    #[test]
    fn should_render_entity_device_and_area_fields() {
        let manifest = manifest();
        let output = render(
            &manifest,
            &[template(
                "card.light.tmpl",
                "{{ entity.name }} in {{ area.name }} by {{device.manufacturer}} at {{ attributes.brightness }}",
            )],
        );
        assert!(output.errors.is_empty(), "{:?}", output.errors);
        assert_eq!(output.artifacts.len(), 1);
        assert_eq!(output.artifacts[0].content, "Ceiling in Kitchen by Signify at 200");
    }

    #[test]
    fn should_skip_rejected_entities() {
        let output = render(&manifest(), &[template("id.light.tmpl", "{{ entity.id }}")]);
        let broken = EntityId::for_entity("light", "broken");
        assert!(output.artifacts.iter().all(|a| a.entity_id != broken));
    }

    #[test]
    fn should_use_fallback_when_value_is_missing() {
        let output = render(
            &manifest(),
            &[template("name.switch.tmpl", "{{ entity.name | \"unnamed\" }}")],
        );
        assert_eq!(output.artifacts[0].content, "unnamed");
    }

    #[test]
    fn should_isolate_failure_to_one_entity() {
        let output = render(&manifest(), &[template("area.tmpl", "{{ area.name }}")]);
        assert_eq!(output.artifacts.len(), 2);
        assert_eq!(output.errors.len(), 1);
        assert_eq!(
            output.errors[0].failure,
            RenderFailure::MissingValue {
                path: "area.name".to_string()
            }
        );
        assert_eq!(
            output.errors[0].entity_id,
            Some(EntityId::for_entity("switch", "pump"))
        );
    }

    #[test]
    fn should_isolate_failure_to_one_template() {
        let output = render(
            &manifest(),
            &[
                template("bad.tmpl", "{{ entity.id"),
                template("good.tmpl", "{{ entity.platform_key }}"),
            ],
        );
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.errors[0].failure, RenderFailure::Unterminated { offset: 0 });
        assert!(output.errors[0].entity_id.is_none());
        assert_eq!(output.artifacts.len(), 3);
    }

    #[test]
    fn should_report_unknown_path() {
        let output = render(&manifest(), &[template("x.switch.tmpl", "{{ entity.colour }}")]);
        assert_eq!(
            output.errors[0].failure,
            RenderFailure::UnknownPath {
                path: "entity.colour".to_string()
            }
        );
    }

    #[test]
    fn should_report_malformed_fallback() {
        let output = render(&manifest(), &[template("x.tmpl", "{{ entity.name | none }}")]);
        assert!(matches!(
            output.errors[0].failure,
            RenderFailure::MalformedFallback { .. }
        ));
    }

    #[test]
    fn should_render_manifest_fields() {
        let manifest = manifest();
        let output = render(
            &manifest,
            &[template("m.switch.tmpl", "{{ manifest.lineage }}@{{ manifest.version }}")],
        );
        assert_eq!(output.artifacts[0].content, "home@1.0.0");
    }

    #[test]
    fn should_render_descriptor_properties() {
        let output = render(
            &manifest(),
            &[template(
                "range.climate.tmpl",
                "{{ descriptors.target_temp_c.min }}..{{ descriptors.target_temp_c.max }} \
                 step {{ descriptors.target_temp_c.step }}{{ descriptors.target_temp_c.unit }} \
                 {{ descriptors.hvac_mode.kind }}:{{ descriptors.hvac_mode.values }}",
            )],
        );
        assert!(output.errors.is_empty(), "{:?}", output.errors);
        assert_eq!(output.artifacts[0].content, "7..30 step 0.5°C enum:heat,off");
    }

    #[test]
    fn should_fall_back_when_entity_has_no_descriptor() {
        let output = render(
            &manifest(),
            &[template("unit.switch.tmpl", "{{ descriptors.power.unit | \"-\" }} {{ entity.device_class }}")],
        );
        assert_eq!(output.artifacts[0].content, "- outlet");
    }

    #[test]
    fn should_report_unknown_descriptor_property() {
        let output = render(
            &manifest(),
            &[template("x.climate.tmpl", "{{ descriptors.hvac_mode.colour }}")],
        );
        assert_eq!(
            output.errors[0].failure,
            RenderFailure::UnknownPath {
                path: "descriptors.hvac_mode.colour".to_string()
            }
        );
    }
}
