//! Demo devices: light, sensor, switch and climate.
//!
//! Each device reports fixed platform ids so the demo topology maps to the
//! same synthetic ids on every run.

mod climate;
mod light;
mod sensor;
mod switch;

pub use climate::DemoThermostat;
pub use light::DemoLight;
pub use sensor::DemoSensor;
pub use switch::DemoSwitch;

use topomap_domain::topology::{RawDevice, RawEntity};

/// Wrapper enum for the concrete demo device types.
pub enum DemoDevice {
    Light(DemoLight),
    Sensor(DemoSensor),
    Switch(DemoSwitch),
    Thermostat(DemoThermostat),
}

impl DemoDevice {
    /// The raw device and the entities it exposes.
    #[must_use]
    pub fn discover(&self) -> (RawDevice, Vec<RawEntity>) {
        match self {
            Self::Light(d) => d.discover(),
            Self::Sensor(d) => d.discover(),
            Self::Switch(d) => d.discover(),
            Self::Thermostat(d) => d.discover(),
        }
    }
}
