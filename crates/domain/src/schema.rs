//! Versioned schema descriptors.
//!
//! A descriptor is plain data: a registry mapping each domain to its rule
//! set. The validator interprets it; nothing dispatches on domain types.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// `major.minor` version of a schema descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchemaVersion {
    pub major: u16,
    pub minor: u16,
}

impl SchemaVersion {
    /// Version of the built-in descriptor.
    pub const V1: Self = Self::new(1, 0);

    #[must_use]
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// Manifests built against compatible schemas can be diffed.
    #[must_use]
    pub fn is_compatible_with(self, other: Self) -> bool {
        self.major == other.major
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::V1
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Returned when a schema version string is not `major.minor`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid schema version `{0}`, expected `major.minor`")]
pub struct InvalidSchemaVersion(pub String);

impl FromStr for SchemaVersion {
    type Err = InvalidSchemaVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidSchemaVersion(s.to_string());
        let (major, minor) = s.trim().split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}

impl TryFrom<String> for SchemaVersion {
    type Error = InvalidSchemaVersion;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SchemaVersion> for String {
    fn from(version: SchemaVersion) -> Self {
        version.to_string()
    }
}

/// Unit of every normalized temperature descriptor.
pub const CELSIUS: &str = "°C";
/// Unit of percentage descriptors.
pub const PERCENT: &str = "%";
/// Unit of color temperature descriptors.
pub const KELVIN: &str = "K";
/// Unit of angle descriptors.
pub const DEGREES: &str = "°";

/// When a descriptor rule applies to an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    /// The attribute is present.
    Present { key: String },
    /// The list attribute contains the value, case-insensitively.
    ListContains { key: String, value: String },
}

impl Condition {
    #[must_use]
    pub fn present(key: &str) -> Self {
        Self::Present {
            key: key.to_string(),
        }
    }

    #[must_use]
    pub fn list_contains(key: &str, value: &str) -> Self {
        Self::ListContains {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// Where a descriptor's typing comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DescriptorSource {
    /// An on/off flag.
    Boolean,
    /// Allowed values from a list attribute, or from a single current value.
    Enum {
        list: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback: Option<String>,
    },
    /// A number with a fixed unit and no known range.
    Number { unit: String },
    /// A number with a fixed unit and range.
    FixedRange {
        unit: String,
        min: f64,
        max: f64,
        step: f64,
    },
    /// A number whose range and unit are read from attributes.
    /// Step defaults to 1.
    RangeFromKeys {
        unit_key: String,
        min_key: String,
        max_key: String,
        step_key: String,
    },
    /// A temperature range, normalized to Celsius. Step defaults to 0.5.
    Temperature {
        min_key: String,
        max_key: String,
        step_key: String,
        unit_key: String,
    },
    /// A color temperature range in Kelvin derived from mired bounds.
    KelvinFromMireds { min_key: String, max_key: String },
}

/// Derives one typed attribute descriptor for entities of a domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptorRule {
    /// Canonical attribute name in the manifest.
    pub name: String,
    #[serde(default)]
    pub optional: bool,
    /// Any one must hold; none means the rule always applies.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub when: Vec<Condition>,
    pub source: DescriptorSource,
}

impl DescriptorRule {
    #[must_use]
    pub fn new(name: &str, source: DescriptorSource) -> Self {
        Self {
            name: name.to_string(),
            optional: false,
            when: Vec::new(),
            source,
        }
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    #[must_use]
    pub fn when(mut self, condition: Condition) -> Self {
        self.when.push(condition);
        self
    }

    #[must_use]
    pub fn when_any(mut self, keys: &[&str]) -> Self {
        self.when.extend(keys.iter().map(|key| Condition::present(key)));
        self
    }

    fn enumeration(name: &str, list: &str, fallback: Option<&str>) -> Self {
        Self::new(
            name,
            DescriptorSource::Enum {
                list: list.to_string(),
                fallback: fallback.map(str::to_string),
            },
        )
    }

    fn percent(name: &str) -> Self {
        Self::new(
            name,
            DescriptorSource::FixedRange {
                unit: PERCENT.to_string(),
                min: 0.0,
                max: 100.0,
                step: 1.0,
            },
        )
    }
}

/// Rules applying to every entity of one domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainRules {
    /// Attributes every entity of the domain must carry.
    #[serde(default)]
    pub required_attributes: BTreeSet<String>,
    /// Whether entities of the domain must resolve to an area.
    #[serde(default)]
    pub require_area: bool,
    /// Known capabilities and the attributes each one implies.
    #[serde(default)]
    pub capabilities: BTreeMap<String, BTreeSet<String>>,
    /// Typed descriptors, in priority order: the first rule for a name wins.
    #[serde(default)]
    pub descriptors: Vec<DescriptorRule>,
}

impl DomainRules {
    #[must_use]
    pub fn require(mut self, attributes: &[&str]) -> Self {
        self.required_attributes
            .extend(attributes.iter().map(ToString::to_string));
        self
    }

    #[must_use]
    pub fn require_area(mut self) -> Self {
        self.require_area = true;
        self
    }

    #[must_use]
    pub fn capability(mut self, name: &str, implies: &[&str]) -> Self {
        self.capabilities.insert(
            name.to_string(),
            implies.iter().map(ToString::to_string).collect(),
        );
        self
    }

    #[must_use]
    pub fn describe(mut self, rule: DescriptorRule) -> Self {
        self.descriptors.push(rule);
        self
    }
}

/// A versioned rule registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub version: SchemaVersion,
    /// Emit `unknown_domain` warnings for domains absent from the registry.
    #[serde(default)]
    pub warn_on_unknown_domain: bool,
    #[serde(default)]
    pub domains: BTreeMap<String, DomainRules>,
}

impl SchemaDescriptor {
    #[must_use]
    pub fn new(version: SchemaVersion) -> Self {
        Self {
            version,
            warn_on_unknown_domain: false,
            domains: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_domain(mut self, domain: &str, rules: DomainRules) -> Self {
        self.domains.insert(domain.to_string(), rules);
        self
    }

    #[must_use]
    pub fn rules_for(&self, domain: &str) -> Option<&DomainRules> {
        self.domains.get(domain)
    }

    /// The descriptor shipped with the engine (version 1.0).
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(SchemaVersion::V1)
            .with_domain(
                "climate",
                DomainRules::default()
                    .require(&["hvac_modes"])
                    .capability("target_temperature", &["min_temp", "max_temp"])
                    .capability("preset_mode", &["preset_modes"])
                    .capability("fan_mode", &["fan_modes"])
                    .describe(DescriptorRule::enumeration("hvac_mode", "hvac_modes", Some("hvac_mode")))
                    .describe(DescriptorRule::enumeration("preset_mode", "preset_modes", None).optional())
                    .describe(DescriptorRule::new(
                        "current_temp_c",
                        DescriptorSource::Number {
                            unit: CELSIUS.to_string(),
                        },
                    ))
                    .describe(DescriptorRule::new(
                        "target_temp_c",
                        DescriptorSource::Temperature {
                            min_key: "min_temp".to_string(),
                            max_key: "max_temp".to_string(),
                            step_key: "target_temp_step".to_string(),
                            unit_key: "temperature_unit".to_string(),
                        },
                    )),
            )
            .with_domain(
                "light",
                DomainRules::default()
                    .capability("brightness", &["brightness"])
                    .capability("color_temp", &["min_mireds", "max_mireds"])
                    .capability("effect", &["effect_list"])
                    .describe(
                        DescriptorRule::percent("brightness_pct")
                            .when_any(&["brightness", "supported_color_modes"]),
                    )
                    .describe(DescriptorRule::enumeration("effect", "effect_list", None).optional())
                    .describe(
                        DescriptorRule::new(
                            "color_temp_k",
                            DescriptorSource::KelvinFromMireds {
                                min_key: "min_mireds".to_string(),
                                max_key: "max_mireds".to_string(),
                            },
                        )
                        .when(Condition::list_contains("supported_color_modes", "color_temp"))
                        .when(Condition::present("min_mireds")),
                    )
                    .describe(
                        DescriptorRule::new(
                            "hue_deg",
                            DescriptorSource::FixedRange {
                                unit: DEGREES.to_string(),
                                min: 0.0,
                                max: 360.0,
                                step: 1.0,
                            },
                        )
                        .when(Condition::list_contains("supported_color_modes", "hs")),
                    )
                    .describe(
                        DescriptorRule::percent("saturation_pct")
                            .when(Condition::list_contains("supported_color_modes", "hs")),
                    ),
            )
            .with_domain(
                "fan",
                DomainRules::default()
                    .capability("set_speed", &["percentage"])
                    .capability("preset_mode", &["preset_modes"])
                    .capability("direction", &["direction"])
                    .capability("oscillate", &["oscillating"])
                    .describe(DescriptorRule::percent("speed_pct").when_any(&["percentage", "speed_list"]))
                    .describe(DescriptorRule::enumeration("preset_mode", "preset_modes", None).optional())
                    .describe(
                        DescriptorRule::enumeration("direction", "direction_list", Some("direction"))
                            .optional(),
                    )
                    .describe(
                        DescriptorRule::new("oscillating", DescriptorSource::Boolean)
                            .optional()
                            .when_any(&["oscillating"]),
                    ),
            )
            .with_domain(
                "cover",
                DomainRules::default()
                    .capability("set_position", &["current_position"])
                    .capability("set_tilt_position", &["current_tilt_position"])
                    .describe(
                        DescriptorRule::percent("position_pct")
                            .when_any(&["current_position", "position"]),
                    )
                    .describe(
                        DescriptorRule::percent("tilt_position_pct")
                            .when_any(&["current_tilt_position", "tilt_position"]),
                    ),
            )
            .with_domain(
                "media_player",
                DomainRules::default()
                    .capability("volume_set", &["volume_level"])
                    .capability("select_source", &["source_list"])
                    .capability("select_sound_mode", &["sound_mode_list"])
                    .describe(DescriptorRule::percent("volume_pct").when_any(&["volume_level"]))
                    .describe(
                        DescriptorRule::enumeration("source", "source_list", Some("source")).optional(),
                    )
                    .describe(
                        DescriptorRule::enumeration("sound_mode", "sound_mode_list", Some("sound_mode"))
                            .optional(),
                    ),
            )
            .with_domain(
                "number",
                DomainRules::default()
                    .require(&["min", "max", "step"])
                    .describe(
                        DescriptorRule::new(
                            "value",
                            DescriptorSource::RangeFromKeys {
                                unit_key: "unit_of_measurement".to_string(),
                                min_key: "min".to_string(),
                                max_key: "max".to_string(),
                                step_key: "step".to_string(),
                            },
                        )
                        .when_any(&["min", "max", "step", "unit_of_measurement"]),
                    ),
            )
            .with_domain("sensor", DomainRules::default())
            .with_domain("switch", DomainRules::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_major_minor_version() {
        let version: SchemaVersion = "2.3".parse().unwrap();
        assert_eq!(version, SchemaVersion::new(2, 3));
        assert_eq!(version.to_string(), "2.3");
    }

    #[test]
    fn should_return_error_when_version_is_malformed() {
        assert!("2".parse::<SchemaVersion>().is_err());
        assert!("a.b".parse::<SchemaVersion>().is_err());
        assert!("1.2.3".parse::<SchemaVersion>().is_err());
    }

    #[test]
    fn should_be_compatible_only_within_same_major() {
        let v1_0 = SchemaVersion::new(1, 0);
        assert!(v1_0.is_compatible_with(SchemaVersion::new(1, 4)));
        assert!(!v1_0.is_compatible_with(SchemaVersion::new(2, 0)));
    }

    #[test]
    fn should_serialize_version_as_string() {
        let json = serde_json::to_string(&SchemaVersion::new(1, 2)).unwrap();
        assert_eq!(json, "\"1.2\"");
    }

    #[test]
    fn should_register_climate_rules_when_builtin() {
        let schema = SchemaDescriptor::builtin();
        let climate = schema.rules_for("climate").unwrap();
        assert!(climate.required_attributes.contains("hvac_modes"));
        let implied = &climate.capabilities["target_temperature"];
        assert!(implied.contains("min_temp"));
        assert!(implied.contains("max_temp"));
    }

    #[test]
    fn should_register_light_color_temp_rule_when_builtin() {
        let schema = SchemaDescriptor::builtin();
        let light = schema.rules_for("light").unwrap();
        let implied: Vec<_> = light.capabilities["color_temp"].iter().cloned().collect();
        assert_eq!(implied, vec!["max_mireds", "min_mireds"]);
    }

    #[test]
    fn should_register_temperature_descriptor_for_climate_when_builtin() {
        let schema = SchemaDescriptor::builtin();
        let climate = schema.rules_for("climate").unwrap();
        let names: Vec<_> = climate.descriptors.iter().map(|rule| rule.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["hvac_mode", "preset_mode", "current_temp_c", "target_temp_c"]
        );
        assert!(matches!(
            climate.descriptors[3].source,
            DescriptorSource::Temperature { .. }
        ));
    }

    #[test]
    fn should_deserialize_descriptor_rules_from_json() {
        let json = r#"{
            "version": "1.1",
            "domains": {
                "valve": {
                    "descriptors": [{
                        "name": "position_pct",
                        "when": [{ "kind": "present", "key": "current_position" }],
                        "source": { "kind": "fixed_range", "unit": "%", "min": 0, "max": 100, "step": 1 }
                    }]
                }
            }
        }"#;
        let schema: SchemaDescriptor = serde_json::from_str(json).unwrap();
        let rule = &schema.rules_for("valve").unwrap().descriptors[0];
        assert_eq!(rule.when, vec![Condition::present("current_position")]);
        assert_eq!(
            rule.source,
            DescriptorSource::FixedRange {
                unit: "%".to_string(),
                min: 0.0,
                max: 100.0,
                step: 1.0,
            }
        );
    }

    #[test]
    fn should_return_none_when_domain_is_unknown() {
        assert!(SchemaDescriptor::builtin().rules_for("vacuum").is_none());
    }

    #[test]
    fn should_deserialize_descriptor_with_defaults() {
        let json = r#"{"version": "1.1", "domains": {"lock": {"require_area": true}}}"#;
        let schema: SchemaDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(schema.version, SchemaVersion::new(1, 1));
        assert!(!schema.warn_on_unknown_domain);
        let lock = schema.rules_for("lock").unwrap();
        assert!(lock.require_area);
        assert!(lock.required_attributes.is_empty());
    }
}
