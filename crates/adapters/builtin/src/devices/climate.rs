//! Demo thermostat: a radiator valve with a target temperature range,
//! reported in Fahrenheit the way imported valves often are.

use topomap_domain::topology::{RawDevice, RawEntity};

/// A thermostatic radiator valve.
pub struct DemoThermostat {
    area: &'static str,
}

impl Default for DemoThermostat {
    fn default() -> Self {
        Self {
            area: "living_room",
        }
    }
}

impl DemoThermostat {
    const DEVICE_UID: &'static str = "demo_trv_1";

    #[must_use]
    pub fn discover(&self) -> (RawDevice, Vec<RawEntity>) {
        let device = RawDevice::new(Self::DEVICE_UID, "Living Room TRV")
            .with_area(self.area)
            .with_manufacturer("topomap")
            .with_model("DemoTRV-1");

        // List-valued platform attributes are flattened to comma-separated strings.
        let entity = RawEntity::new("climate", "climate.living_room_trv")
            .with_name("Living Room TRV")
            .with_device(Self::DEVICE_UID)
            .with_attribute("hvac_modes", "off,heat,auto")
            .with_attribute("min_temp", 41.0)
            .with_attribute("max_temp", 86.0)
            .with_attribute("target_temp_step", 1.0)
            .with_attribute("temperature_unit", "\u{b0}F")
            .with_capability("target_temperature");

        (device, vec![entity])
    }
}
