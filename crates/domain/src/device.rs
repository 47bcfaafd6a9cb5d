//! Device: a physical or logical unit owning one or more entities.

use serde::{Deserialize, Serialize};

use crate::id::{AreaId, DeviceId};

/// A device of the canonical graph.
///
/// Entities reference devices weakly: a device never owns its entities and
/// removing one does not cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    /// Identifier assigned by the automation platform.
    pub platform_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_id: Option<AreaId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Device {
    /// Create a device whose id is derived from its platform id.
    #[must_use]
    pub fn new(platform_id: impl Into<String>, name: impl Into<String>) -> Self {
        let platform_id = platform_id.into();
        Self {
            id: DeviceId::for_device(&platform_id),
            platform_id,
            name: name.into(),
            area_id: None,
            manufacturer: None,
            model: None,
        }
    }

    #[must_use]
    pub fn with_area(mut self, area_id: AreaId) -> Self {
        self.area_id = Some(area_id);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_derive_id_from_platform_id() {
        let device = Device::new("hue_bridge", "Hue Bridge");
        assert_eq!(device.id, DeviceId::for_device("hue_bridge"));
        assert_eq!(device.name, "Hue Bridge");
        assert!(device.area_id.is_none());
    }

    #[test]
    fn should_carry_optional_fields_when_set() {
        let device = Device::new("thermo", "Thermostat")
            .with_area(AreaId::for_area("hall"))
            .with_manufacturer("Acme")
            .with_model("T-100");
        assert_eq!(device.area_id, Some(AreaId::for_area("hall")));
        assert_eq!(device.manufacturer.as_deref(), Some("Acme"));
        assert_eq!(device.model.as_deref(), Some("T-100"));
    }

    #[test]
    fn should_roundtrip_through_serde_json() {
        let device = Device::new("plug", "Plug").with_model("P1");
        let json = serde_json::to_string(&device).unwrap();
        let parsed: Device = serde_json::from_str(&json).unwrap();
        assert_eq!(device, parsed);
    }
}
