//! Demo light: dimmable with a color temperature range.

use topomap_domain::topology::{RawDevice, RawEntity};

/// A ceiling light in the living room.
pub struct DemoLight {
    area: &'static str,
}

impl Default for DemoLight {
    fn default() -> Self {
        Self {
            area: "living_room",
        }
    }
}

impl DemoLight {
    const DEVICE_UID: &'static str = "demo_hue_bridge_light_1";

    #[must_use]
    pub fn discover(&self) -> (RawDevice, Vec<RawEntity>) {
        let device = RawDevice::new(Self::DEVICE_UID, "Living Room Ceiling")
            .with_area(self.area)
            .with_manufacturer("topomap")
            .with_model("DemoLight-1");

        let entity = RawEntity::new("light", "light.living_room_ceiling")
            .with_name("Living Room Ceiling")
            .with_device(Self::DEVICE_UID)
            .with_attribute("brightness", 180_i64)
            .with_attribute("min_mireds", 153_i64)
            .with_attribute("max_mireds", 500_i64)
            .with_capability("brightness")
            .with_capability("color_temp");

        (device, vec![entity])
    }
}
