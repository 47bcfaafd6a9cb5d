//! # topomap-adapter-builtin
//!
//! Adapters that need no external system: a simulated home for trying the
//! pipeline without a platform, a fixed in-memory topology, and the schema
//! descriptors compiled into the engine.
//!
//! ## Demo topology
//!
//! | Device | Entities | Area |
//! |--------|----------|------|
//! | Living Room Ceiling | `light.living_room_ceiling` | `living_room` |
//! | Living Room Multisensor | `sensor.living_room_temperature`, `sensor.living_room_humidity` | `living_room` |
//! | Kettle Plug | `switch.kettle` | `kitchen` |
//! | Living Room TRV | `climate.living_room_trv` | `living_room` |
//!
//! Areas form the tree `home > ground_floor > {living_room, kitchen}`.
//! The TRV reports Fahrenheit; the home also exposes a small service catalog
//! (`climate.set_temperature`, `climate.set_hvac_mode`, `light.turn_on`,
//! `switch.turn_on`).
//!
//! ## Dependency rule
//!
//! Depends on `topomap-app` (port traits) and `topomap-domain` only.

mod devices;
mod schema;

pub use schema::BuiltinSchemaSource;

use topomap_app::ports::DiscoveryAdapter;
use topomap_domain::error::MapError;
use topomap_domain::topology::{RawArea, RawService, RawServiceField, RawTopology};

use devices::{DemoDevice, DemoLight, DemoSensor, DemoSwitch, DemoThermostat};

/// Discovery adapter producing the simulated demo home.
pub struct DemoDiscovery {
    devices: Vec<DemoDevice>,
    areas: Vec<RawArea>,
    services: Vec<RawService>,
}

impl Default for DemoDiscovery {
    fn default() -> Self {
        Self {
            devices: vec![
                DemoDevice::Light(DemoLight::default()),
                DemoDevice::Sensor(DemoSensor::default()),
                DemoDevice::Switch(DemoSwitch::default()),
                DemoDevice::Thermostat(DemoThermostat::default()),
            ],
            areas: vec![
                RawArea::new("home", "Home"),
                RawArea::new("ground_floor", "Ground Floor").with_parent("home"),
                RawArea::new("living_room", "Living Room").with_parent("ground_floor"),
                RawArea::new("kitchen", "Kitchen").with_parent("ground_floor"),
            ],
            services: vec![
                // Untyped fields are filled in during normalization.
                RawService::new("climate", "set_temperature")
                    .with_field("temperature", RawServiceField::default().required()),
                RawService::new("climate", "set_hvac_mode")
                    .with_field("hvac_mode", RawServiceField::default().required()),
                RawService::new("light", "turn_on")
                    .with_field("brightness_pct", RawServiceField::default())
                    .with_field("transition", RawServiceField::typed("number")),
                RawService::new("switch", "turn_on"),
            ],
        }
    }
}

impl DiscoveryAdapter for DemoDiscovery {
    fn name(&self) -> &str {
        "demo"
    }

    async fn fetch_topology(&self) -> Result<RawTopology, MapError> {
        let mut topology = RawTopology {
            areas: self.areas.clone(),
            services: self.services.clone(),
            ..RawTopology::default()
        };
        for device in &self.devices {
            let (raw_device, entities) = device.discover();
            topology.devices.push(raw_device);
            topology.entities.extend(entities);
        }
        tracing::debug!(
            entities = topology.entities.len(),
            devices = topology.devices.len(),
            areas = topology.areas.len(),
            services = topology.services.len(),
            "demo topology generated"
        );
        Ok(topology)
    }
}

/// Discovery adapter that hands out a fixed, pre-built topology.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    topology: RawTopology,
}

impl StaticDiscovery {
    #[must_use]
    pub fn new(topology: RawTopology) -> Self {
        Self { topology }
    }
}

impl DiscoveryAdapter for StaticDiscovery {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch_topology(&self) -> Result<RawTopology, MapError> {
        Ok(self.topology.clone())
    }
}
