//! Entity: a single observable or controllable aspect of a device, in its
//! canonical, normalized form.

mod attribute_value;
mod status;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub use self::attribute_value::AttributeValue;
pub use self::status::ValidationStatus;
use crate::descriptor::AttributeDescriptor;
use crate::id::{AreaId, DeviceId, EntityId};

/// How an entity's area was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaSource {
    /// The entity named its area itself.
    Direct,
    /// The area was inherited from the owning device.
    Device,
}

impl std::fmt::Display for AreaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Device => f.write_str("device"),
        }
    }
}

/// A resolved area reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaRef {
    pub id: AreaId,
    pub source: AreaSource,
}

/// A canonical entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    /// Unique id assigned by the platform, as discovered.
    pub platform_id: String,
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<AreaRef>,
    /// Platform classification, such as `temperature` or `motion`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
    /// Typed descriptors inferred from the attributes by the schema.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub descriptors: BTreeMap<String, AttributeDescriptor>,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    #[serde(default)]
    pub status: ValidationStatus,
}

impl Entity {
    /// Create an entity whose id is derived from `(domain, platform_id)`.
    #[must_use]
    pub fn new(domain: impl Into<String>, platform_id: impl Into<String>) -> Self {
        let domain = domain.into();
        let platform_id = platform_id.into();
        Self {
            id: EntityId::for_entity(&domain, &platform_id),
            platform_id,
            domain,
            name: None,
            device_id: None,
            area: None,
            device_class: None,
            attributes: BTreeMap::new(),
            descriptors: BTreeMap::new(),
            capabilities: BTreeSet::new(),
            status: ValidationStatus::Valid,
        }
    }

    /// Platform key in `domain.object` form.
    ///
    /// Platform ids that already carry the domain prefix are returned as-is.
    #[must_use]
    pub fn platform_key(&self) -> String {
        platform_key(&self.domain, &self.platform_id)
    }

    /// Look up a single attribute.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// The resolved area id, direct or inherited.
    #[must_use]
    pub fn area_id(&self) -> Option<&AreaId> {
        self.area.as_ref().map(|area| &area.id)
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_device(mut self, device_id: DeviceId) -> Self {
        self.device_id = Some(device_id);
        self
    }

    #[must_use]
    pub fn with_area(mut self, id: AreaId, source: AreaSource) -> Self {
        self.area = Some(AreaRef { id, source });
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    #[must_use]
    pub fn with_device_class(mut self, device_class: impl Into<String>) -> Self {
        self.device_class = Some(device_class.into());
        self
    }

    #[must_use]
    pub fn with_descriptor(mut self, name: impl Into<String>, descriptor: AttributeDescriptor) -> Self {
        self.descriptors.insert(name.into(), descriptor);
        self
    }
}

/// Build the `domain.object` key for a platform id.
#[must_use]
pub fn platform_key(domain: &str, platform_id: &str) -> String {
    match platform_id.split_once('.') {
        Some((prefix, _)) if prefix == domain => platform_id.to_string(),
        _ => format!("{domain}.{platform_id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_derive_id_from_domain_and_platform_id() {
        let entity = Entity::new("light", "kitchen");
        assert_eq!(entity.id, EntityId::for_entity("light", "kitchen"));
        assert_eq!(entity.status, ValidationStatus::Valid);
    }

    #[test]
    fn should_prefix_platform_key_when_platform_id_is_bare() {
        let entity = Entity::new("light", "kitchen");
        assert_eq!(entity.platform_key(), "light.kitchen");
    }

    #[test]
    fn should_keep_platform_key_when_already_prefixed() {
        let entity = Entity::new("sensor", "sensor.outdoor_temp");
        assert_eq!(entity.platform_key(), "sensor.outdoor_temp");
    }

    #[test]
    fn should_prefix_platform_key_when_prefix_is_another_domain() {
        assert_eq!(platform_key("switch", "light.porch"), "switch.light.porch");
    }

    #[test]
    fn should_expose_area_id_when_inherited() {
        let entity =
            Entity::new("light", "desk").with_area(AreaId::for_area("office"), AreaSource::Device);
        assert_eq!(entity.area_id(), Some(&AreaId::for_area("office")));
        assert_eq!(entity.area.unwrap().source, AreaSource::Device);
    }

    #[test]
    fn should_look_up_attribute_when_present() {
        let entity = Entity::new("climate", "hall").with_attribute("min_temp", 7.0);
        assert_eq!(entity.attribute("min_temp"), Some(&AttributeValue::Float(7.0)));
        assert!(entity.attribute("max_temp").is_none());
    }

    #[test]
    fn should_roundtrip_through_serde_json() {
        let entity = Entity::new("light", "porch")
            .with_name("Porch")
            .with_device(DeviceId::for_device("hue_1"))
            .with_area(AreaId::for_area("outside"), AreaSource::Direct)
            .with_attribute("brightness", 200_i64)
            .with_descriptor("brightness_pct", AttributeDescriptor::number(Some("%")))
            .with_device_class("light")
            .with_capability("brightness");
        let json = serde_json::to_string(&entity).unwrap();
        let parsed: Entity = serde_json::from_str(&json).unwrap();
        assert_eq!(entity, parsed);
    }
}
