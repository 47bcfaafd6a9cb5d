//! Demo sensor: temperature and humidity readings from one device.

use topomap_domain::topology::{RawDevice, RawEntity};

/// A multi-sensor with two entities.
pub struct DemoSensor {
    area: &'static str,
}

impl Default for DemoSensor {
    fn default() -> Self {
        Self {
            area: "living_room",
        }
    }
}

impl DemoSensor {
    const DEVICE_UID: &'static str = "demo_multisensor_1";

    #[must_use]
    pub fn discover(&self) -> (RawDevice, Vec<RawEntity>) {
        let device = RawDevice::new(Self::DEVICE_UID, "Living Room Multisensor")
            .with_area(self.area)
            .with_manufacturer("topomap")
            .with_model("DemoSense-2");

        let temperature = RawEntity::new("sensor", "sensor.living_room_temperature")
            .with_name("Living Room Temperature")
            .with_device(Self::DEVICE_UID)
            .with_attribute("device_class", "temperature")
            .with_attribute("unit_of_measurement", "\u{b0}C");

        let humidity = RawEntity::new("sensor", "sensor.living_room_humidity")
            .with_name("Living Room Humidity")
            .with_device(Self::DEVICE_UID)
            .with_attribute("device_class", "humidity")
            .with_attribute("unit_of_measurement", "%");

        (device, vec![temperature, humidity])
    }
}
