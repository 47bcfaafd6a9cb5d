//! Graph normalizer: raw topology in, canonical graph plus structural
//! defects out.
//!
//! Normalization never fails as a whole. Defective items (blank identifiers,
//! conflicting duplicates, synthetic id and platform key collisions, area
//! cycles) are reported and left out; everything else proceeds.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Display;

use sha2::{Digest, Sha256};

use crate::area::Area;
use crate::device::Device;
use crate::entity::{AreaRef, AreaSource, Entity};
use crate::id::{AreaId, DeviceId, EntityId};
use crate::issue::{IssueCode, SubjectKind, ValidationIssue, sort_issues};
use crate::service::{Service, ServiceField};
use crate::topology::{RawArea, RawDevice, RawEntity, RawService, RawTopology, non_blank};

/// Canonical graph, keyed and ordered by synthetic id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedGraph {
    pub entities: BTreeMap<EntityId, Entity>,
    pub devices: BTreeMap<DeviceId, Device>,
    pub areas: BTreeMap<AreaId, Area>,
    /// Service catalog keyed by `domain.name`.
    pub services: BTreeMap<String, Service>,
}

/// Normalizer output.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub graph: NormalizedGraph,
    /// Structural defects, sorted.
    pub defects: Vec<ValidationIssue>,
}

/// Normalize a raw topology.
///
/// The result depends only on the set of raw items, not on their order.
#[must_use]
pub fn normalize(raw: &RawTopology) -> Normalized {
    let mut defects = Vec::new();

    let areas = normalize_areas(&raw.areas, &mut defects);
    let devices = normalize_devices(&raw.devices, &mut defects);
    let mut entities = normalize_entities(&raw.entities, &mut defects);
    inherit_areas(&mut entities, &devices);
    let services = normalize_services(&raw.services, &mut defects);

    let graph = NormalizedGraph {
        entities,
        devices,
        areas,
        services,
    };
    report_orphans(&graph, &mut defects);
    sort_issues(&mut defects);

    Normalized { graph, defects }
}

/// Length-prefixed digest of an item's fields, used to tell conflicting
/// duplicates apart in reports.
#[derive(Default)]
struct Fingerprint(Sha256);

impl Fingerprint {
    fn count(&mut self, count: usize) -> &mut Self {
        self.0.update((count as u64).to_be_bytes());
        self
    }

    fn part(&mut self, value: &str) -> &mut Self {
        self.count(value.len());
        self.0.update(value.as_bytes());
        self
    }

    fn opt(&mut self, value: Option<&str>) -> &mut Self {
        match value {
            Some(value) => {
                self.0.update([1]);
                self.part(value)
            }
            None => {
                self.0.update([0]);
                self
            }
        }
    }

    fn finish(self) -> String {
        let digest = hex::encode(self.0.finalize());
        digest[..12].to_string()
    }
}

trait Candidate: PartialEq {
    const KIND: SubjectKind;
    type Id: Ord + Clone + Display;

    fn id(&self) -> Self::Id;
    /// Deduplication key.
    fn key(&self) -> (String, String);
    /// Human-readable platform identity.
    fn label(&self) -> String;
    fn fingerprint(&self, digest: &mut Fingerprint);
}

impl Candidate for Area {
    const KIND: SubjectKind = SubjectKind::Area;
    type Id = AreaId;

    fn id(&self) -> AreaId {
        self.id.clone()
    }

    fn key(&self) -> (String, String) {
        (String::new(), self.platform_id.clone())
    }

    fn label(&self) -> String {
        self.platform_id.clone()
    }

    fn fingerprint(&self, digest: &mut Fingerprint) {
        digest
            .part(&self.platform_id)
            .part(&self.name)
            .opt(self.parent_id.as_ref().map(AreaId::as_str));
    }
}

impl Candidate for Device {
    const KIND: SubjectKind = SubjectKind::Device;
    type Id = DeviceId;

    fn id(&self) -> DeviceId {
        self.id.clone()
    }

    fn key(&self) -> (String, String) {
        (String::new(), self.platform_id.clone())
    }

    fn label(&self) -> String {
        self.platform_id.clone()
    }

    fn fingerprint(&self, digest: &mut Fingerprint) {
        digest
            .part(&self.platform_id)
            .part(&self.name)
            .opt(self.area_id.as_ref().map(AreaId::as_str))
            .opt(self.manufacturer.as_deref())
            .opt(self.model.as_deref());
    }
}

impl Candidate for Entity {
    const KIND: SubjectKind = SubjectKind::Entity;
    type Id = EntityId;

    fn id(&self) -> EntityId {
        self.id.clone()
    }

    fn key(&self) -> (String, String) {
        (self.domain.clone(), self.platform_id.clone())
    }

    fn label(&self) -> String {
        self.platform_key()
    }

    fn fingerprint(&self, digest: &mut Fingerprint) {
        digest
            .part(&self.domain)
            .part(&self.platform_id)
            .opt(self.name.as_deref())
            .opt(self.device_id.as_ref().map(DeviceId::as_str))
            .opt(self.area_id().map(AreaId::as_str))
            .opt(self.device_class.as_deref())
            .count(self.attributes.len());
        for (key, value) in &self.attributes {
            digest.part(key).part(value.kind()).part(&value.to_string());
        }
        digest.count(self.capabilities.len());
        for capability in &self.capabilities {
            digest.part(capability);
        }
    }
}

impl Candidate for Service {
    const KIND: SubjectKind = SubjectKind::Service;
    type Id = String;

    fn id(&self) -> String {
        Service::key(self)
    }

    fn key(&self) -> (String, String) {
        (self.domain.clone(), self.name.clone())
    }

    fn label(&self) -> String {
        Service::key(self)
    }

    fn fingerprint(&self, digest: &mut Fingerprint) {
        digest
            .part(&self.domain)
            .part(&self.name)
            .count(self.fields.len());
        for (name, field) in &self.fields {
            digest
                .part(name)
                .opt(field.kind.as_deref())
                .opt(field.unit.as_deref())
                .count(usize::from(field.required));
        }
    }
}

fn content_digest<T: Candidate>(item: &T) -> String {
    let mut digest = Fingerprint::default();
    item.fingerprint(&mut digest);
    digest.finish()
}

fn empty_identifier(kind: SubjectKind, name: &str) -> ValidationIssue {
    ValidationIssue::error(
        IssueCode::EmptyIdentifier,
        kind,
        "",
        format!("{kind} `{}` has a blank identifier; skipped", name.trim()),
    )
}

/// Merge identical duplicates; drop and report conflicting ones.
fn merge_duplicates<T: Candidate>(candidates: Vec<T>, defects: &mut Vec<ValidationIssue>) -> Vec<T> {
    let mut groups: BTreeMap<(String, String), Vec<T>> = BTreeMap::new();
    for candidate in candidates {
        let group = groups.entry(candidate.key()).or_default();
        if !group.contains(&candidate) {
            group.push(candidate);
        }
    }

    let mut merged = Vec::with_capacity(groups.len());
    for mut group in groups.into_values() {
        if group.len() == 1 {
            merged.push(group.swap_remove(0));
            continue;
        }
        let mut digests: Vec<String> = group.iter().map(content_digest).collect();
        digests.sort();
        let first = &group[0];
        defects.push(ValidationIssue::error(
            IssueCode::DuplicateConflict,
            T::KIND,
            first.id().to_string(),
            format!(
                "{} `{}` reported {} times with conflicting content ({}); excluded",
                T::KIND,
                first.label(),
                group.len(),
                digests.join(", ")
            ),
        ));
    }
    merged
}

/// Key merged items by synthetic id; drop and report id collisions.
fn index_by_id<T: Candidate>(
    merged: Vec<T>,
    defects: &mut Vec<ValidationIssue>,
) -> BTreeMap<T::Id, T> {
    let mut groups: BTreeMap<T::Id, Vec<T>> = BTreeMap::new();
    for item in merged {
        groups.entry(item.id()).or_default().push(item);
    }

    let mut indexed = BTreeMap::new();
    for (id, mut group) in groups {
        if group.len() == 1 {
            indexed.insert(id, group.swap_remove(0));
            continue;
        }
        let mut labels: Vec<String> = group.iter().map(Candidate::label).collect();
        labels.sort();
        defects.push(ValidationIssue::error(
            IssueCode::SyntheticIdCollision,
            T::KIND,
            id.to_string(),
            format!("synthetic id shared by {}; excluded", labels.join(", ")),
        ));
    }
    indexed
}

fn normalize_areas(raw: &[RawArea], defects: &mut Vec<ValidationIssue>) -> BTreeMap<AreaId, Area> {
    let mut candidates = Vec::with_capacity(raw.len());
    for area in raw {
        let Some(uid) = non_blank(Some(area.unique_id.as_str())) else {
            defects.push(empty_identifier(SubjectKind::Area, &area.name));
            continue;
        };
        let mut candidate = Area::new(uid, area.name.trim());
        candidate.parent_id = non_blank(area.parent_id.as_deref()).map(AreaId::for_area);
        candidates.push(candidate);
    }

    let merged = merge_duplicates(candidates, defects);
    let areas = index_by_id(merged, defects);
    exclude_cycles(areas, defects)
}

fn normalize_devices(
    raw: &[RawDevice],
    defects: &mut Vec<ValidationIssue>,
) -> BTreeMap<DeviceId, Device> {
    let mut candidates = Vec::with_capacity(raw.len());
    for device in raw {
        let Some(uid) = non_blank(Some(device.unique_id.as_str())) else {
            defects.push(empty_identifier(SubjectKind::Device, &device.name));
            continue;
        };
        let mut candidate = Device::new(uid, device.name.trim());
        candidate.area_id = non_blank(device.area_id.as_deref()).map(AreaId::for_area);
        candidate.manufacturer = non_blank(device.manufacturer.as_deref()).map(str::to_string);
        candidate.model = non_blank(device.model.as_deref()).map(str::to_string);
        candidates.push(candidate);
    }

    let merged = merge_duplicates(candidates, defects);
    index_by_id(merged, defects)
}

fn normalize_entities(
    raw: &[RawEntity],
    defects: &mut Vec<ValidationIssue>,
) -> BTreeMap<EntityId, Entity> {
    let mut candidates = Vec::with_capacity(raw.len());
    let mut dropped: BTreeMap<EntityId, BTreeSet<String>> = BTreeMap::new();
    for entity in raw {
        let domain = entity.resolved_domain();
        let uid = entity.unique_id.trim();
        if uid.is_empty() || domain.is_empty() {
            let name = entity.name.as_deref().unwrap_or(uid);
            defects.push(empty_identifier(SubjectKind::Entity, name));
            continue;
        }

        let mut candidate = Entity::new(domain, uid);
        candidate.name = non_blank(entity.name.as_deref()).map(str::to_string);
        candidate.device_id = non_blank(entity.device_id.as_deref()).map(DeviceId::for_device);
        candidate.area = non_blank(entity.area_id.as_deref()).map(|area| AreaRef {
            id: AreaId::for_area(area),
            source: AreaSource::Direct,
        });
        candidate.device_class = entity.resolved_device_class().map(str::to_string);
        for (key, value) in &entity.attributes {
            if value.is_finite() {
                candidate.attributes.insert(key.clone(), value.clone());
            } else {
                dropped.entry(candidate.id.clone()).or_default().insert(key.clone());
            }
        }
        candidate.capabilities = entity
            .capabilities
            .iter()
            .map(|capability| capability.trim())
            .filter(|capability| !capability.is_empty())
            .map(str::to_string)
            .collect();
        candidates.push(candidate);
    }

    let merged = merge_duplicates(candidates, defects);
    let entities = exclude_platform_key_collisions(index_by_id(merged, defects), defects);
    for (id, keys) in dropped {
        if !entities.contains_key(&id) {
            continue;
        }
        for key in keys {
            defects.push(ValidationIssue::warning(
                IssueCode::NonFiniteAttribute,
                SubjectKind::Entity,
                id.to_string(),
                format!("attribute `{key}` is not a finite number; dropped"),
            ));
        }
    }
    entities
}

/// Remove entities sharing a platform key, one defect per shared key.
///
/// `(switch, kitchen)` and `(switch, switch.kitchen)` get distinct synthetic
/// ids but both claim `switch.kitchen`.
fn exclude_platform_key_collisions(
    mut entities: BTreeMap<EntityId, Entity>,
    defects: &mut Vec<ValidationIssue>,
) -> BTreeMap<EntityId, Entity> {
    let mut claims: BTreeMap<String, Vec<EntityId>> = BTreeMap::new();
    for entity in entities.values() {
        claims.entry(entity.platform_key()).or_default().push(entity.id.clone());
    }

    for (key, ids) in claims {
        if ids.len() < 2 {
            continue;
        }
        let claimants: Vec<String> = ids
            .iter()
            .filter_map(|id| entities.remove(id))
            .map(|entity| format!("{} ({})", entity.id, entity.platform_id))
            .collect();
        defects.push(ValidationIssue::error(
            IssueCode::PlatformKeyCollision,
            SubjectKind::Entity,
            ids[0].to_string(),
            format!(
                "platform key `{key}` shared by {}; excluded",
                claimants.join(", ")
            ),
        ));
    }
    entities
}

fn normalize_services(
    raw: &[RawService],
    defects: &mut Vec<ValidationIssue>,
) -> BTreeMap<String, Service> {
    let mut candidates = Vec::with_capacity(raw.len());
    for service in raw {
        let domain = service.domain.trim();
        let name = service.service.trim();
        if domain.is_empty() || name.is_empty() {
            defects.push(empty_identifier(SubjectKind::Service, &format!("{domain}.{name}")));
            continue;
        }

        let mut candidate = Service::new(domain, name);
        for (field, raw_field) in &service.fields {
            let Some(field) = non_blank(Some(field.as_str())) else {
                defects.push(ValidationIssue::error(
                    IssueCode::EmptyIdentifier,
                    SubjectKind::Service,
                    candidate.key(),
                    format!("service `{}` has a field with a blank name; skipped", candidate.key()),
                ));
                continue;
            };
            candidate.fields.insert(
                field.to_string(),
                ServiceField {
                    kind: non_blank(raw_field.kind.as_deref()).map(str::to_string),
                    unit: non_blank(raw_field.unit.as_deref()).map(str::to_string),
                    required: raw_field.required,
                },
            );
        }
        candidate.apply_typing();
        candidates.push(candidate);
    }

    merge_duplicates(candidates, defects)
        .into_iter()
        .map(|service| (service.key(), service))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Remove every area on a parent cycle, one defect per cycle.
///
/// Each area has at most one parent, so the depth-first walk from a node is
/// its parent chain. A chain that reaches a gray node has closed a cycle.
fn exclude_cycles(
    mut areas: BTreeMap<AreaId, Area>,
    defects: &mut Vec<ValidationIssue>,
) -> BTreeMap<AreaId, Area> {
    let ids: Vec<AreaId> = areas.keys().cloned().collect();
    let index: HashMap<&AreaId, usize> = ids.iter().enumerate().map(|(i, id)| (id, i)).collect();
    let parents: Vec<Option<usize>> = areas
        .values()
        .map(|area| {
            area.parent_id
                .as_ref()
                .and_then(|parent| index.get(parent).copied())
        })
        .collect();

    let mut color = vec![Color::White; ids.len()];
    let mut cyclic = BTreeSet::new();
    for start in 0..ids.len() {
        if color[start] != Color::White {
            continue;
        }
        let mut path = Vec::new();
        let mut cursor = Some(start);
        while let Some(node) = cursor {
            match color[node] {
                Color::White => {
                    color[node] = Color::Gray;
                    path.push(node);
                    cursor = parents[node];
                }
                Color::Gray => {
                    if let Some(pos) = path.iter().position(|&n| n == node) {
                        let mut members: Vec<usize> = path[pos..].to_vec();
                        members.sort_unstable();
                        report_cycle(&ids, &areas, &members, defects);
                        cyclic.extend(members);
                    }
                    break;
                }
                Color::Black => break,
            }
        }
        for node in path {
            color[node] = Color::Black;
        }
    }

    for node in cyclic {
        areas.remove(&ids[node]);
    }
    areas
}

fn report_cycle(
    ids: &[AreaId],
    areas: &BTreeMap<AreaId, Area>,
    members: &[usize],
    defects: &mut Vec<ValidationIssue>,
) {
    let names: Vec<String> = members
        .iter()
        .map(|&node| {
            let id = &ids[node];
            let platform_id = areas.get(id).map_or("", |area| area.platform_id.as_str());
            format!("{id} ({platform_id})")
        })
        .collect();
    defects.push(ValidationIssue::error(
        IssueCode::AreaCycle,
        SubjectKind::Area,
        ids[members[0]].to_string(),
        format!(
            "parent cycle through {} areas: {}; excluded",
            members.len(),
            names.join(", ")
        ),
    ));
}

fn inherit_areas(entities: &mut BTreeMap<EntityId, Entity>, devices: &BTreeMap<DeviceId, Device>) {
    for entity in entities.values_mut() {
        if entity.area.is_some() {
            continue;
        }
        let inherited = entity
            .device_id
            .as_ref()
            .and_then(|device_id| devices.get(device_id))
            .and_then(|device| device.area_id.clone());
        entity.area = inherited.map(|id| AreaRef {
            id,
            source: AreaSource::Device,
        });
    }
}

fn report_orphans(graph: &NormalizedGraph, defects: &mut Vec<ValidationIssue>) {
    let used_devices: BTreeSet<&DeviceId> = graph
        .entities
        .values()
        .filter_map(|entity| entity.device_id.as_ref())
        .collect();
    for device in graph.devices.values() {
        if !used_devices.contains(&device.id) {
            defects.push(ValidationIssue::warning(
                IssueCode::OrphanDevice,
                SubjectKind::Device,
                device.id.to_string(),
                format!("device `{}` is not referenced by any entity", device.platform_id),
            ));
        }
    }

    let used_areas: BTreeSet<&AreaId> = graph
        .devices
        .values()
        .filter_map(|device| device.area_id.as_ref())
        .chain(graph.entities.values().filter_map(Entity::area_id))
        .chain(graph.areas.values().filter_map(|area| area.parent_id.as_ref()))
        .collect();
    for area in graph.areas.values() {
        if !used_areas.contains(&area.id) {
            defects.push(ValidationIssue::warning(
                IssueCode::OrphanArea,
                SubjectKind::Area,
                area.id.to_string(),
                format!(
                    "area `{}` is not referenced by any device, entity or child area",
                    area.platform_id
                ),
            ));
        }
    }
}
