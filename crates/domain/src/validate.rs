//! Schema validator.
//!
//! Rules are independent: each inspects the whole graph and returns its own
//! issues. Only the final sort combines them, so evaluation order never
//! shows in the report.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::descriptor;
use crate::entity::{AreaSource, Entity, ValidationStatus};
use crate::id::EntityId;
use crate::issue::{IssueCode, Severity, SubjectKind, ValidationIssue, sort_issues};
use crate::normalize::{Normalized, NormalizedGraph};
use crate::schema::{SchemaDescriptor, SchemaVersion};

/// Policy for entities that carry an ERROR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Rejected entities are left out of the manifest.
    #[default]
    Strict,
    /// Rejected entities stay in the manifest, flagged.
    Lenient,
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => f.write_str("strict"),
            Self::Lenient => f.write_str("lenient"),
        }
    }
}

/// Returned when parsing an unknown validation mode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown validation mode `{0}`, expected `strict` or `lenient`")]
pub struct InvalidModeError(pub String);

impl FromStr for ValidationMode {
    type Err = InvalidModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            _ => Err(InvalidModeError(s.to_string())),
        }
    }
}

/// One validation rule of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    RequiredAttributes,
    ReferentialIntegrity,
    CapabilityConsistency,
    AttributeTypes,
}

impl Rule {
    /// Every rule, in evaluation order.
    pub const PIPELINE: [Self; 4] = [
        Self::RequiredAttributes,
        Self::ReferentialIntegrity,
        Self::CapabilityConsistency,
        Self::AttributeTypes,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::RequiredAttributes => "required_attributes",
            Self::ReferentialIntegrity => "referential_integrity",
            Self::CapabilityConsistency => "capability_consistency",
            Self::AttributeTypes => "attribute_types",
        }
    }

    /// Inspect the graph. Never mutates it.
    #[must_use]
    pub fn evaluate(self, graph: &NormalizedGraph, schema: &SchemaDescriptor) -> Vec<ValidationIssue> {
        match self {
            Self::RequiredAttributes => required_attributes(graph, schema),
            Self::ReferentialIntegrity => referential_integrity(graph),
            Self::CapabilityConsistency => capability_consistency(graph, schema),
            Self::AttributeTypes => attribute_types(graph, schema),
        }
    }
}

/// Sorted issues plus the per-entity verdicts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
    pub statuses: BTreeMap<EntityId, ValidationStatus>,
}

impl ValidationReport {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    fn count(&self, severity: Severity) -> usize {
        self.issues
            .iter()
            .filter(|issue| issue.severity == severity)
            .count()
    }

    /// Issues about one subject, in report order.
    pub fn issues_for<'a>(&'a self, subject: &'a str) -> impl Iterator<Item = &'a ValidationIssue> {
        self.issues.iter().filter(move |issue| issue.subject == subject)
    }
}

/// Validator output, ready for the builder.
#[derive(Debug, Clone)]
pub struct ValidatedGraph {
    /// Graph with statuses and descriptors applied and, in strict mode,
    /// rejected entities removed.
    pub graph: NormalizedGraph,
    pub report: ValidationReport,
    pub mode: ValidationMode,
    /// Entities removed in strict mode.
    pub excluded: Vec<EntityId>,
    pub schema_version: SchemaVersion,
}

/// Validate a normalized graph against a schema descriptor.
///
/// Structural defects from normalization are merged into the report and
/// count toward entity statuses.
#[must_use]
pub fn validate(
    normalized: Normalized,
    schema: &SchemaDescriptor,
    mode: ValidationMode,
) -> ValidatedGraph {
    let Normalized { mut graph, defects } = normalized;

    let mut issues = defects;
    for rule in Rule::PIPELINE {
        issues.extend(rule.evaluate(&graph, schema));
    }
    sort_issues(&mut issues);

    let statuses = entity_statuses(&graph, &issues);
    let mut excluded = Vec::new();
    for (id, status) in &statuses {
        if mode == ValidationMode::Strict && status.is_rejected() {
            graph.entities.remove(id);
            excluded.push(id.clone());
        } else if let Some(entity) = graph.entities.get_mut(id) {
            entity.status = *status;
        }
    }
    describe_entities(&mut graph, schema);

    ValidatedGraph {
        graph,
        report: ValidationReport { issues, statuses },
        mode,
        excluded,
        schema_version: schema.version,
    }
}

fn entity_statuses(
    graph: &NormalizedGraph,
    issues: &[ValidationIssue],
) -> BTreeMap<EntityId, ValidationStatus> {
    let mut worst: BTreeMap<&str, Severity> = BTreeMap::new();
    for issue in issues {
        if issue.subject_kind != SubjectKind::Entity {
            continue;
        }
        let entry = worst.entry(issue.subject.as_str()).or_insert(issue.severity);
        if issue.severity == Severity::Error {
            *entry = Severity::Error;
        }
    }

    graph
        .entities
        .keys()
        .map(|id| {
            let status = match worst.get(id.as_str()) {
                Some(Severity::Error) => ValidationStatus::Rejected,
                Some(Severity::Warning) => ValidationStatus::ValidWithWarnings,
                None => ValidationStatus::Valid,
            };
            (id.clone(), status)
        })
        .collect()
}

fn entity_issue(code: IssueCode, entity: &Entity, message: String) -> ValidationIssue {
    ValidationIssue::error(code, SubjectKind::Entity, entity.id.to_string(), message)
}

fn required_attributes(graph: &NormalizedGraph, schema: &SchemaDescriptor) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for entity in graph.entities.values() {
        let Some(rules) = schema.rules_for(&entity.domain) else {
            if schema.warn_on_unknown_domain {
                issues.push(ValidationIssue::warning(
                    IssueCode::UnknownDomain,
                    SubjectKind::Entity,
                    entity.id.to_string(),
                    format!(
                        "domain `{}` is not described by schema {}",
                        entity.domain, schema.version
                    ),
                ));
            }
            continue;
        };

        for attribute in &rules.required_attributes {
            if !entity.attributes.contains_key(attribute) {
                issues.push(entity_issue(
                    IssueCode::MissingRequiredAttribute,
                    entity,
                    format!(
                        "`{}` requires attribute `{attribute}` for domain `{}`",
                        entity.platform_key(),
                        entity.domain
                    ),
                ));
            }
        }
        if rules.require_area && entity.area.is_none() {
            issues.push(entity_issue(
                IssueCode::MissingArea,
                entity,
                format!(
                    "`{}` has no area but domain `{}` requires one",
                    entity.platform_key(),
                    entity.domain
                ),
            ));
        }
    }
    issues
}

fn referential_integrity(graph: &NormalizedGraph) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for entity in graph.entities.values() {
        if let Some(device_id) = &entity.device_id
            && !graph.devices.contains_key(device_id)
        {
            issues.push(entity_issue(
                IssueCode::DanglingDeviceReference,
                entity,
                format!("`{}` references unknown device {device_id}", entity.platform_key()),
            ));
        }
        if let Some(area) = &entity.area
            && !graph.areas.contains_key(&area.id)
        {
            let how = match area.source {
                AreaSource::Direct => "references",
                AreaSource::Device => "inherits",
            };
            issues.push(entity_issue(
                IssueCode::DanglingAreaReference,
                entity,
                format!("`{}` {how} unknown area {}", entity.platform_key(), area.id),
            ));
        }
    }

    for device in graph.devices.values() {
        if let Some(area_id) = &device.area_id
            && !graph.areas.contains_key(area_id)
        {
            issues.push(ValidationIssue::error(
                IssueCode::DanglingAreaReference,
                SubjectKind::Device,
                device.id.to_string(),
                format!("device `{}` references unknown area {area_id}", device.platform_id),
            ));
        }
    }

    for area in graph.areas.values() {
        if let Some(parent_id) = &area.parent_id
            && !graph.areas.contains_key(parent_id)
        {
            issues.push(ValidationIssue::error(
                IssueCode::DanglingAreaParent,
                SubjectKind::Area,
                area.id.to_string(),
                format!("area `{}` has unknown parent {parent_id}", area.platform_id),
            ));
        }
    }

    issues
}

fn capability_consistency(
    graph: &NormalizedGraph,
    schema: &SchemaDescriptor,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for entity in graph.entities.values() {
        let Some(rules) = schema.rules_for(&entity.domain) else {
            continue;
        };
        for capability in &entity.capabilities {
            let Some(implied) = rules.capabilities.get(capability) else {
                issues.push(ValidationIssue::warning(
                    IssueCode::UnknownCapability,
                    SubjectKind::Entity,
                    entity.id.to_string(),
                    format!(
                        "capability `{capability}` is not known for domain `{}`",
                        entity.domain
                    ),
                ));
                continue;
            };
            let missing: BTreeSet<&str> = implied
                .iter()
                .filter(|attribute| !entity.attributes.contains_key(*attribute))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                let missing: Vec<&str> = missing.into_iter().collect();
                issues.push(entity_issue(
                    IssueCode::CapabilityMismatch,
                    entity,
                    format!(
                        "capability `{capability}` of `{}` requires missing attributes: {}",
                        entity.platform_key(),
                        missing.join(", ")
                    ),
                ));
            }
        }
    }
    issues
}

fn attribute_types(graph: &NormalizedGraph, schema: &SchemaDescriptor) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for entity in graph.entities.values() {
        let Some(rules) = schema.rules_for(&entity.domain) else {
            continue;
        };
        for rule in &rules.descriptors {
            for problem in descriptor::check(rule, &entity.attributes) {
                issues.push(entity_issue(
                    IssueCode::InvalidAttributeValue,
                    entity,
                    format!("`{}`: {problem}", entity.platform_key()),
                ));
            }
        }
    }
    issues
}

/// Attach the typed descriptors of every entity left in the graph.
fn describe_entities(graph: &mut NormalizedGraph, schema: &SchemaDescriptor) {
    for entity in graph.entities.values_mut() {
        if let Some(rules) = schema.rules_for(&entity.domain) {
            entity.descriptors = descriptor::infer(&entity.attributes, &rules.descriptors);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::schema::DomainRules;
    use crate::topology::{RawArea, RawDevice, RawEntity, RawTopology};

    fn thermostat(with_modes: bool) -> RawEntity {
        let entity = RawEntity::new("climate", "hall_thermostat")
            .with_area("hall")
            .with_attribute("min_temp", 7.0)
            .with_attribute("max_temp", 30.0)
            .with_capability("target_temperature");
        if with_modes {
            entity.with_attribute("hvac_modes", "heat,off")
        } else {
            entity
        }
    }

    fn topology(entities: Vec<RawEntity>) -> RawTopology {
        let areas = if entities.iter().any(|entity| entity.area_id.is_some()) {
            vec![RawArea::new("hall", "Hall")]
        } else {
            vec![]
        };
        RawTopology {
            entities,
            areas,
            ..RawTopology::default()
        }
    }

    fn run(topology: &RawTopology, mode: ValidationMode) -> ValidatedGraph {
        validate(normalize(topology), &SchemaDescriptor::builtin(), mode)
    }

    fn codes(validated: &ValidatedGraph) -> Vec<IssueCode> {
        validated.report.issues.iter().map(|issue| issue.code).collect()
    }

    #[test]
    fn should_accept_entity_when_rules_are_satisfied() {
        let validated = run(&topology(vec![thermostat(true)]), ValidationMode::Strict);
        assert!(validated.report.issues.is_empty(), "{:?}", validated.report.issues);
        let entity = validated.graph.entities.values().next().unwrap();
        assert_eq!(entity.status, ValidationStatus::Valid);
    }

    #[test]
    fn should_exclude_entity_missing_required_attribute_when_strict() {
        let validated = run(&topology(vec![thermostat(false)]), ValidationMode::Strict);
        let id = EntityId::for_entity("climate", "hall_thermostat");
        assert!(validated.graph.entities.is_empty());
        assert_eq!(validated.excluded, vec![id.clone()]);
        assert_eq!(validated.report.statuses[&id], ValidationStatus::Rejected);
        assert_eq!(codes(&validated), vec![IssueCode::MissingRequiredAttribute]);
    }

    #[test]
    fn should_flag_entity_missing_required_attribute_when_lenient() {
        let strict = run(&topology(vec![thermostat(false)]), ValidationMode::Strict);
        let lenient = run(&topology(vec![thermostat(false)]), ValidationMode::Lenient);
        let entity = lenient.graph.entities.values().next().unwrap();
        assert_eq!(entity.status, ValidationStatus::Rejected);
        assert!(lenient.excluded.is_empty());
        assert_eq!(strict.report.issues, lenient.report.issues);
    }

    #[test]
    fn should_report_capability_mismatch_when_implied_attribute_missing() {
        let light = RawEntity::new("light", "desk").with_capability("color_temp");
        let validated = run(&topology(vec![light]), ValidationMode::Lenient);
        assert_eq!(codes(&validated), vec![IssueCode::CapabilityMismatch]);
        assert!(validated.report.issues[0].message.contains("max_mireds, min_mireds"));
    }

    #[test]
    fn should_warn_without_rejecting_when_capability_unknown() {
        let light = RawEntity::new("light", "desk").with_capability("teleport");
        let validated = run(&topology(vec![light]), ValidationMode::Strict);
        assert_eq!(codes(&validated), vec![IssueCode::UnknownCapability]);
        let entity = validated.graph.entities.values().next().unwrap();
        assert_eq!(entity.status, ValidationStatus::ValidWithWarnings);
    }

    #[test]
    fn should_report_dangling_device_reference() {
        let sensor = RawEntity::new("sensor", "lost").with_device("nowhere");
        let validated = run(&topology(vec![sensor]), ValidationMode::Strict);
        assert!(codes(&validated).contains(&IssueCode::DanglingDeviceReference));
        assert!(validated.graph.entities.is_empty());
    }

    #[test]
    fn should_report_dangling_area_for_entity_and_device() {
        let topology = RawTopology {
            entities: vec![RawEntity::new("switch", "fan").with_device("plug")],
            devices: vec![RawDevice::new("plug", "Plug").with_area("attic")],
            ..RawTopology::default()
        };
        let validated = run(&topology, ValidationMode::Lenient);
        let kinds: Vec<_> = validated
            .report
            .issues
            .iter()
            .filter(|issue| issue.code == IssueCode::DanglingAreaReference)
            .map(|issue| issue.subject_kind)
            .collect();
        assert_eq!(kinds.len(), 2);
        assert!(kinds.contains(&SubjectKind::Entity));
        assert!(kinds.contains(&SubjectKind::Device));
        assert!(validated.report.issues.iter().any(|i| i.message.contains("inherits")));
    }

    #[test]
    fn should_report_dangling_area_parent() {
        let topology = RawTopology {
            areas: vec![RawArea::new("kitchen", "Kitchen").with_parent("ghost_floor")],
            ..RawTopology::default()
        };
        let validated = run(&topology, ValidationMode::Strict);
        assert!(codes(&validated).contains(&IssueCode::DanglingAreaParent));
    }

    #[test]
    fn should_report_missing_area_when_domain_requires_one() {
        let schema = SchemaDescriptor::new(SchemaVersion::new(1, 1))
            .with_domain("lock", DomainRules::default().require_area());
        let topology = RawTopology {
            entities: vec![RawEntity::new("lock", "front_door")],
            ..RawTopology::default()
        };
        let validated = validate(normalize(&topology), &schema, ValidationMode::Strict);
        assert_eq!(codes(&validated), vec![IssueCode::MissingArea]);
        assert_eq!(validated.schema_version, SchemaVersion::new(1, 1));
    }

    #[test]
    fn should_warn_about_unknown_domain_only_when_enabled() {
        let topology = RawTopology {
            entities: vec![RawEntity::new("vacuum", "roomba")],
            ..RawTopology::default()
        };
        let quiet = run(&topology, ValidationMode::Strict);
        assert!(quiet.report.issues.is_empty());

        let mut schema = SchemaDescriptor::builtin();
        schema.warn_on_unknown_domain = true;
        let loud = validate(normalize(&topology), &schema, ValidationMode::Strict);
        assert_eq!(codes(&loud), vec![IssueCode::UnknownDomain]);
    }

    #[test]
    fn should_give_same_issues_regardless_of_rule_order() {
        let topology = topology(vec![
            thermostat(false),
            RawEntity::new("light", "desk")
                .with_device("nowhere")
                .with_capability("effect"),
        ]);
        let normalized = normalize(&topology);
        let schema = SchemaDescriptor::builtin();
        let mut forward: Vec<_> = Rule::PIPELINE
            .iter()
            .flat_map(|rule| rule.evaluate(&normalized.graph, &schema))
            .collect();
        let mut backward: Vec<_> = Rule::PIPELINE
            .iter()
            .rev()
            .flat_map(|rule| rule.evaluate(&normalized.graph, &schema))
            .collect();
        sort_issues(&mut forward);
        sort_issues(&mut backward);
        assert_eq!(forward, backward);
    }

    #[test]
    fn should_parse_mode_case_insensitively() {
        assert_eq!("Strict".parse::<ValidationMode>().unwrap(), ValidationMode::Strict);
        assert_eq!("lenient".parse::<ValidationMode>().unwrap(), ValidationMode::Lenient);
        assert!("loose".parse::<ValidationMode>().is_err());
    }

    #[test]
    fn should_count_errors_and_warnings() {
        let light = RawEntity::new("light", "desk")
            .with_capability("teleport")
            .with_capability("color_temp");
        let validated = run(&topology(vec![light]), ValidationMode::Lenient);
        assert_eq!(validated.report.error_count(), 1);
        assert_eq!(validated.report.warning_count(), 1);
        assert!(validated.report.has_errors());
    }

    #[test]
    fn should_attach_descriptors_to_accepted_entities() {
        let validated = run(&topology(vec![thermostat(true)]), ValidationMode::Strict);
        let entity = validated.graph.entities.values().next().unwrap();
        let names: Vec<_> = entity.descriptors.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["current_temp_c", "hvac_mode", "target_temp_c"]);
        assert_eq!(entity.descriptors["hvac_mode"].values, vec!["heat", "off"]);
    }

    #[test]
    fn should_reject_entity_when_range_attribute_is_not_numeric() {
        let number = RawEntity::new("number", "fan_speed")
            .with_attribute("min", 0_i64)
            .with_attribute("max", "lots")
            .with_attribute("step", 1_i64);
        let validated = run(&topology(vec![number]), ValidationMode::Lenient);
        assert_eq!(codes(&validated), vec![IssueCode::InvalidAttributeValue]);
        assert!(validated.report.issues[0].message.contains("`max`"));
        let entity = validated.graph.entities.values().next().unwrap();
        assert_eq!(entity.status, ValidationStatus::Rejected);
    }

    #[test]
    fn should_reject_inverted_temperature_range() {
        let entity = thermostat(true).with_attribute("min_temp", 35.0);
        let validated = run(&topology(vec![entity]), ValidationMode::Strict);
        assert_eq!(codes(&validated), vec![IssueCode::InvalidAttributeValue]);
        assert!(validated.report.issues[0].message.contains("target_temp_c"));
        assert!(validated.graph.entities.is_empty());
    }
}
