//! Demo switch: a smart plug in the kitchen.

use topomap_domain::topology::{RawDevice, RawEntity};

/// A kettle plug.
pub struct DemoSwitch {
    area: &'static str,
}

impl Default for DemoSwitch {
    fn default() -> Self {
        Self { area: "kitchen" }
    }
}

impl DemoSwitch {
    const DEVICE_UID: &'static str = "demo_plug_1";

    #[must_use]
    pub fn discover(&self) -> (RawDevice, Vec<RawEntity>) {
        let device = RawDevice::new(Self::DEVICE_UID, "Kettle Plug")
            .with_area(self.area)
            .with_manufacturer("topomap")
            .with_model("DemoPlug-1");

        let entity = RawEntity::new("switch", "switch.kettle")
            .with_name("Kettle")
            .with_device(Self::DEVICE_UID)
            .with_device_class("outlet")
            .with_attribute("assumed_state", false);

        (device, vec![entity])
    }
}
