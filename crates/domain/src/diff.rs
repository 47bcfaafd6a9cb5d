//! Structural diff between two manifests.
//!
//! Items are matched by synthetic id, services by `domain.name`. Every
//! modification carries a field-level change list; all output is sorted by
//! id and field name.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::area::Area;
use crate::descriptor::AttributeDescriptor;
use crate::device::Device;
use crate::entity::{AttributeValue, Entity};
use crate::id::{AreaId, DeviceId, EntityId};
use crate::manifest::{ChangeScope, Manifest, ManifestVersion};
use crate::schema::SchemaVersion;
use crate::service::{Service, ServiceField};

const CAPABILITY_PREFIX: &str = "capabilities.";
const SERVICE_FIELD_PREFIX: &str = "fields.";

/// Returned when two manifests straddle a schema major version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot diff manifests across schema major versions ({old} -> {new})")]
pub struct IncompatibleSchema {
    pub old: SchemaVersion,
    pub new: SchemaVersion,
}

/// One changed field. Absent values are `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old: Value,
    pub new: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemChange<I> {
    pub id: I,
    pub changes: Vec<FieldChange>,
}

/// Additions, removals and modifications within one item set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetDiff<I> {
    pub added: Vec<I>,
    pub removed: Vec<I>,
    pub modified: Vec<ItemChange<I>>,
}

impl<I> SetDiff<I> {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaTransition {
    pub old: SchemaVersion,
    pub new: SchemaVersion,
}

impl SchemaTransition {
    #[must_use]
    pub fn is_change(&self) -> bool {
        self.old != self.new
    }
}

/// Difference between two manifest generations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestDiff {
    pub schema_transition: SchemaTransition,
    pub old_version: ManifestVersion,
    pub new_version: ManifestVersion,
    pub entities: SetDiff<EntityId>,
    pub devices: SetDiff<DeviceId>,
    pub areas: SetDiff<AreaId>,
    /// Services keyed by `domain.name`.
    #[serde(default = "SetDiff::empty")]
    pub services: SetDiff<String>,
}

impl<I> SetDiff<I> {
    fn empty() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            modified: Vec::new(),
        }
    }
}

impl ManifestDiff {
    /// Whether the item sets are identical.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
            && self.devices.is_empty()
            && self.areas.is_empty()
            && self.services.is_empty()
    }

    /// Version bump implied by this diff.
    ///
    /// Removals, including a capability dropped from a kept entity or a
    /// field dropped from a kept service, are major. Additions, including a
    /// new capability or service field, are minor. Any other field change,
    /// descriptors included, is a patch.
    #[must_use]
    pub fn change_scope(&self) -> ChangeScope {
        let membership_changes = || {
            let capabilities = self
                .entities
                .modified
                .iter()
                .flat_map(|item| &item.changes)
                .filter(|change| change.field.starts_with(CAPABILITY_PREFIX));
            let service_fields = self
                .services
                .modified
                .iter()
                .flat_map(|item| &item.changes)
                .filter(|change| change.field.starts_with(SERVICE_FIELD_PREFIX));
            capabilities.chain(service_fields)
        };

        let removed = !self.entities.removed.is_empty()
            || !self.devices.removed.is_empty()
            || !self.areas.removed.is_empty()
            || !self.services.removed.is_empty()
            || membership_changes().any(|change| change.new.is_null());
        if removed {
            return ChangeScope::Major;
        }

        let added = !self.entities.added.is_empty()
            || !self.devices.added.is_empty()
            || !self.areas.added.is_empty()
            || !self.services.added.is_empty()
            || membership_changes().any(|change| change.old.is_null());
        if added {
            return ChangeScope::Minor;
        }

        if self.is_empty() {
            ChangeScope::None
        } else {
            ChangeScope::Patch
        }
    }
}

/// Diff two manifests.
///
/// # Errors
///
/// Returns [`IncompatibleSchema`] when the manifests were built against
/// different schema major versions.
pub fn diff(old: &Manifest, new: &Manifest) -> Result<ManifestDiff, IncompatibleSchema> {
    if !old.schema_version.is_compatible_with(new.schema_version) {
        return Err(IncompatibleSchema {
            old: old.schema_version,
            new: new.schema_version,
        });
    }
    Ok(diff_content(old, new))
}

/// Diff without the schema compatibility check.
pub(crate) fn diff_content(old: &Manifest, new: &Manifest) -> ManifestDiff {
    ManifestDiff {
        schema_transition: SchemaTransition {
            old: old.schema_version,
            new: new.schema_version,
        },
        old_version: old.version,
        new_version: new.version,
        entities: diff_sets(&old.entities, &new.entities, |e| e.id.clone(), entity_fields),
        devices: diff_sets(&old.devices, &new.devices, |d| d.id.clone(), device_fields),
        areas: diff_sets(&old.areas, &new.areas, |a| a.id.clone(), area_fields),
        services: diff_sets(&old.services, &new.services, Service::key, service_fields),
    }
}

fn diff_sets<T, I, F>(old: &[T], new: &[T], id: impl Fn(&T) -> I, fields: F) -> SetDiff<I>
where
    I: Ord + Clone,
    F: Fn(&T) -> BTreeMap<String, Value>,
{
    let old_by_id: BTreeMap<I, &T> = old.iter().map(|item| (id(item), item)).collect();
    let new_by_id: BTreeMap<I, &T> = new.iter().map(|item| (id(item), item)).collect();

    let added = new_by_id
        .keys()
        .filter(|key| !old_by_id.contains_key(*key))
        .cloned()
        .collect();
    let removed = old_by_id
        .keys()
        .filter(|key| !new_by_id.contains_key(*key))
        .cloned()
        .collect();

    let mut modified = Vec::new();
    for (key, old_item) in &old_by_id {
        let Some(new_item) = new_by_id.get(key) else {
            continue;
        };
        let changes = diff_fields(fields(*old_item), fields(*new_item));
        if !changes.is_empty() {
            modified.push(ItemChange {
                id: key.clone(),
                changes,
            });
        }
    }

    SetDiff {
        added,
        removed,
        modified,
    }
}

fn diff_fields(
    mut old: BTreeMap<String, Value>,
    mut new: BTreeMap<String, Value>,
) -> Vec<FieldChange> {
    let names: BTreeSet<String> = old.keys().chain(new.keys()).cloned().collect();
    names
        .into_iter()
        .filter_map(|field| {
            let old_value = old.remove(&field).unwrap_or(Value::Null);
            let new_value = new.remove(&field).unwrap_or(Value::Null);
            (old_value != new_value).then_some(FieldChange {
                field,
                old: old_value,
                new: new_value,
            })
        })
        .collect()
}

fn optional(value: Option<&str>) -> Value {
    value.map_or(Value::Null, Value::from)
}

fn attribute_value(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Bool(value) => Value::Bool(*value),
        AttributeValue::Int(value) => Value::from(*value),
        AttributeValue::Float(value) => Value::from(*value),
        AttributeValue::String(value) => Value::from(value.as_str()),
    }
}

fn entity_fields(entity: &Entity) -> BTreeMap<String, Value> {
    let mut fields = BTreeMap::new();
    fields.insert("platform_id".to_string(), Value::from(entity.platform_id.as_str()));
    fields.insert("domain".to_string(), Value::from(entity.domain.as_str()));
    fields.insert("name".to_string(), optional(entity.name.as_deref()));
    fields.insert(
        "device_id".to_string(),
        optional(entity.device_id.as_ref().map(DeviceId::as_str)),
    );
    fields.insert(
        "area".to_string(),
        entity.area.as_ref().map_or(Value::Null, |area| {
            json!({ "id": area.id.as_str(), "source": area.source.to_string() })
        }),
    );
    fields.insert("device_class".to_string(), optional(entity.device_class.as_deref()));
    fields.insert("status".to_string(), Value::from(entity.status.to_string()));
    for (key, value) in &entity.attributes {
        fields.insert(format!("attributes.{key}"), attribute_value(value));
    }
    for (name, descriptor) in &entity.descriptors {
        fields.insert(format!("descriptors.{name}"), descriptor_value(descriptor));
    }
    for capability in &entity.capabilities {
        fields.insert(format!("{CAPABILITY_PREFIX}{capability}"), Value::Bool(true));
    }
    fields
}

fn descriptor_value(descriptor: &AttributeDescriptor) -> Value {
    json!({
        "kind": descriptor.kind.as_str(),
        "unit": descriptor.unit,
        "optional": descriptor.optional,
        "values": descriptor.values,
        "range": descriptor.range.as_ref().map(|range| json!({
            "min": range.min,
            "max": range.max,
            "step": range.step,
        })),
    })
}

fn service_field_value(field: &ServiceField) -> Value {
    json!({ "type": field.kind, "unit": field.unit, "required": field.required })
}

fn service_fields(service: &Service) -> BTreeMap<String, Value> {
    service
        .fields
        .iter()
        .map(|(name, field)| (format!("{SERVICE_FIELD_PREFIX}{name}"), service_field_value(field)))
        .collect()
}

fn device_fields(device: &Device) -> BTreeMap<String, Value> {
    BTreeMap::from([
        ("platform_id".to_string(), Value::from(device.platform_id.as_str())),
        ("name".to_string(), Value::from(device.name.as_str())),
        (
            "area_id".to_string(),
            optional(device.area_id.as_ref().map(AreaId::as_str)),
        ),
        ("manufacturer".to_string(), optional(device.manufacturer.as_deref())),
        ("model".to_string(), optional(device.model.as_deref())),
    ])
}

fn area_fields(area: &Area) -> BTreeMap<String, Value> {
    BTreeMap::from([
        ("platform_id".to_string(), Value::from(area.platform_id.as_str())),
        ("name".to_string(), Value::from(area.name.as_str())),
        (
            "parent_id".to_string(),
            optional(area.parent_id.as_ref().map(AreaId::as_str)),
        ),
    ])
}
