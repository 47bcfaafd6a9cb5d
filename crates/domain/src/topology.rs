//! Raw topology: the plain data a discovery adapter hands to the engine.
//!
//! Nothing here is validated. Empty strings in optional references are
//! treated as absent, and an entity may leave its domain blank when its
//! unique id carries a `domain.` prefix.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::entity::AttributeValue;

/// A complete snapshot of one discovery run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTopology {
    #[serde(default)]
    pub entities: Vec<RawEntity>,
    #[serde(default)]
    pub devices: Vec<RawDevice>,
    #[serde(default)]
    pub areas: Vec<RawArea>,
    #[serde(default)]
    pub services: Vec<RawService>,
}

impl RawTopology {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
            && self.devices.is_empty()
            && self.areas.is_empty()
            && self.services.is_empty()
    }
}

/// An entity as reported by the platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEntity {
    pub unique_id: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_id: Option<String>,
    /// Falls back to the `device_class` attribute when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
}

impl RawEntity {
    #[must_use]
    pub fn new(domain: impl Into<String>, unique_id: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            domain: domain.into(),
            ..Self::default()
        }
    }

    /// The entity's domain, falling back to the unique id's `domain.` prefix.
    #[must_use]
    pub fn resolved_domain(&self) -> &str {
        let domain = self.domain.trim();
        if !domain.is_empty() {
            return domain;
        }
        self.unique_id
            .split_once('.')
            .map_or("", |(prefix, _)| prefix.trim())
    }

    /// The explicit device class, or the `device_class` text attribute.
    #[must_use]
    pub fn resolved_device_class(&self) -> Option<&str> {
        non_blank(self.device_class.as_deref()).or_else(|| match self.attributes.get("device_class") {
            Some(AttributeValue::String(class)) => non_blank(Some(class.as_str())),
            _ => None,
        })
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    #[must_use]
    pub fn with_area(mut self, area_id: impl Into<String>) -> Self {
        self.area_id = Some(area_id.into());
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
}

/// A device as reported by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDevice {
    pub unique_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl RawDevice {
    #[must_use]
    pub fn new(unique_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_area(mut self, area_id: impl Into<String>) -> Self {
        self.area_id = Some(area_id.into());
        self
    }

    #[must_use]
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// An area as reported by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawArea {
    pub unique_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl RawArea {
    #[must_use]
    pub fn new(unique_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            name: name.into(),
            parent_id: None,
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}

/// A service call field as reported by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawServiceField {
    #[serde(default)]
    pub required: bool,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl RawServiceField {
    #[must_use]
    pub fn typed(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// A service as reported by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawService {
    pub domain: String,
    pub service: String,
    #[serde(default)]
    pub fields: BTreeMap<String, RawServiceField>,
}

impl RawService {
    #[must_use]
    pub fn new(domain: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
            fields: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, field: RawServiceField) -> Self {
        self.fields.insert(name.into(), field);
        self
    }
}

/// Trim an optional reference, mapping blank values to `None`.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
