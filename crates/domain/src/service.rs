//! Service: an action a domain exposes, with its typed fields.
//!
//! Field types are free-form platform names (`number`, `percent`, `enum`,
//! `mireds`, `duration_s`, ...). Well-known fields the platform leaves
//! untyped are filled from a built-in table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::schema::{CELSIUS, KELVIN, PERCENT};

/// One parameter of a service call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceField {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
}

impl ServiceField {
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// A service of the catalog, identified by `domain.name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub domain: String,
    pub name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, ServiceField>,
}

impl Service {
    #[must_use]
    pub fn new(domain: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, field: ServiceField) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// Catalog key, `domain.name`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}.{}", self.domain, self.name)
    }

    /// Call shape: `domain.name|field:type[:req][:unit]|...`, fields sorted.
    #[must_use]
    pub fn signature(&self) -> String {
        let mut shape = self.key();
        shape.push('|');
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|(name, field)| {
                let mut part = format!("{name}:{}", field.kind.as_deref().unwrap_or_default());
                if field.required {
                    part.push_str(":req");
                }
                if let Some(unit) = &field.unit {
                    part.push(':');
                    part.push_str(unit);
                }
                part
            })
            .collect();
        shape.push_str(&fields.join("|"));
        shape
    }

    /// SHA-256 hex digest of [`Self::signature`].
    #[must_use]
    pub fn signature_digest(&self) -> String {
        hex::encode(Sha256::digest(self.signature().as_bytes()))
    }

    /// Fill the type and unit of well-known fields left blank.
    pub fn apply_typing(&mut self) {
        for (name, field) in &mut self.fields {
            let typing = TYPING.iter().find(|(domain, services, field_name, _, _)| {
                *domain == self.domain.as_str()
                    && services.contains(&self.name.as_str())
                    && *field_name == name.as_str()
            });
            let Some(&(_, _, _, kind, unit)) = typing else {
                continue;
            };
            if field.kind.is_none() {
                field.kind = Some(kind.to_string());
            }
            if field.unit.is_none() {
                field.unit = unit.map(str::to_string);
            }
        }
    }
}

type Typing = (&'static str, &'static [&'static str], &'static str, &'static str, Option<&'static str>);

/// `(domain, services, field, type, unit)`.
const TYPING: &[Typing] = &[
    ("climate", &["set_temperature"], "temperature", "number", Some(CELSIUS)),
    ("climate", &["set_hvac_mode"], "hvac_mode", "enum", None),
    ("climate", &["set_preset_mode"], "preset_mode", "enum", None),
    ("light", &["turn_on"], "brightness_pct", "percent", Some(PERCENT)),
    ("light", &["turn_on"], "color_temp", "mireds", Some("mired")),
    ("light", &["turn_on"], "color_temp_kelvin", "number", Some(KELVIN)),
    ("light", &["turn_on"], "kelvin", "number", Some(KELVIN)),
    ("light", &["turn_on"], "transition", "duration_s", Some("s")),
    ("light", &["turn_on"], "effect", "enum", None),
    ("fan", &["set_percentage", "set_speed"], "percentage", "percent", Some(PERCENT)),
    ("fan", &["set_direction"], "direction", "enum", None),
    ("fan", &["set_preset_mode", "set_preset"], "preset_mode", "enum", None),
    ("cover", &["set_cover_position"], "position", "percent", Some(PERCENT)),
    ("cover", &["set_cover_tilt_position"], "tilt_position", "percent", Some(PERCENT)),
    ("media_player", &["volume_set"], "volume_level", "percent", Some(PERCENT)),
    ("media_player", &["select_source"], "source", "enum", None),
    ("media_player", &["select_sound_mode"], "sound_mode", "enum", None),
    ("number", &["set_value"], "value", "number", None),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_key_service_by_domain_and_name() {
        assert_eq!(Service::new("light", "turn_on").key(), "light.turn_on");
    }

    #[test]
    fn should_build_signature_from_sorted_fields() {
        let service = Service::new("light", "turn_on")
            .with_field("transition", ServiceField::new("duration_s").with_unit("s"))
            .with_field("brightness_pct", ServiceField::new("percent").required());
        assert_eq!(
            service.signature(),
            "light.turn_on|brightness_pct:percent:req|transition:duration_s:s"
        );
        assert_eq!(service.signature_digest().len(), 64);
    }

    #[test]
    fn should_keep_trailing_separator_when_service_has_no_fields() {
        assert_eq!(Service::new("switch", "toggle").signature(), "switch.toggle|");
    }

    #[test]
    fn should_fill_blank_types_of_well_known_fields() {
        let mut service = Service::new("climate", "set_temperature")
            .with_field("temperature", ServiceField::default().required())
            .with_field("hvac_mode", ServiceField::default());
        service.apply_typing();
        let temperature = &service.fields["temperature"];
        assert_eq!(temperature.kind.as_deref(), Some("number"));
        assert_eq!(temperature.unit.as_deref(), Some(CELSIUS));
        assert!(temperature.required);
        assert_eq!(service.fields["hvac_mode"], ServiceField::default());
    }

    #[test]
    fn should_keep_platform_types_when_already_set() {
        let mut service = Service::new("fan", "set_speed")
            .with_field("percentage", ServiceField::new("integer").with_unit("pct"));
        service.apply_typing();
        let field = &service.fields["percentage"];
        assert_eq!(field.kind.as_deref(), Some("integer"));
        assert_eq!(field.unit.as_deref(), Some("pct"));
    }

    #[test]
    fn should_type_color_temperature_fields_by_unit() {
        let mut service = Service::new("light", "turn_on")
            .with_field("color_temp", ServiceField::default())
            .with_field("kelvin", ServiceField::default());
        service.apply_typing();
        assert_eq!(service.fields["color_temp"].unit.as_deref(), Some("mired"));
        assert_eq!(service.fields["kelvin"].unit.as_deref(), Some(KELVIN));
    }
}
