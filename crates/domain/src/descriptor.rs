//! Typed attribute descriptors.
//!
//! A descriptor tells a consumer how to drive one attribute of an entity:
//! its kind, its unit, and the values or range it accepts. Descriptors are
//! inferred from raw attributes by the [`DescriptorRule`]s of the entity's
//! domain. Temperatures are always described in Celsius.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::AttributeValue;
use crate::schema::{CELSIUS, Condition, DescriptorRule, DescriptorSource, KELVIN};

/// Default step of temperature ranges, in the source unit.
pub const TEMPERATURE_STEP: f64 = 0.5;
/// Step of color temperature ranges.
pub const COLOR_TEMP_STEP_K: f64 = 50.0;
/// Default step of ranges read from attributes.
pub const DEFAULT_STEP: f64 = 1.0;

const MIREDS_PER_KELVIN: f64 = 1_000_000.0;

/// Value kind of a typed attribute or service field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Boolean,
    Enum,
    Number,
}

impl FieldKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Enum => "enum",
            Self::Number => "number",
        }
    }

    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Boolean => 0,
            Self::Enum => 1,
            Self::Number => 2,
        }
    }

    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Boolean),
            1 => Some(Self::Enum),
            2 => Some(Self::Number),
            _ => None,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepted numeric range. Unknown bounds are left open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CapabilityRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
}

impl CapabilityRange {
    #[must_use]
    pub fn new(min: f64, max: f64, step: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            step: Some(step),
        }
    }

    /// Whether both bounds are known and `min` exceeds `max`.
    #[must_use]
    pub fn is_inverted(&self) -> bool {
        matches!((self.min, self.max), (Some(min), Some(max)) if min > max)
    }
}

/// How to drive one attribute of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
    /// Allowed values of an enum, in platform order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<CapabilityRange>,
}

impl AttributeDescriptor {
    #[must_use]
    pub fn boolean() -> Self {
        Self {
            kind: FieldKind::Boolean,
            unit: None,
            optional: false,
            values: Vec::new(),
            range: None,
        }
    }

    #[must_use]
    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut distinct: Vec<String> = Vec::new();
        for value in values {
            let value = value.into();
            if !distinct.contains(&value) {
                distinct.push(value);
            }
        }
        Self {
            kind: FieldKind::Enum,
            values: distinct,
            ..Self::boolean()
        }
    }

    #[must_use]
    pub fn number(unit: Option<&str>) -> Self {
        Self {
            kind: FieldKind::Number,
            unit: unit.map(str::to_string),
            ..Self::boolean()
        }
    }

    #[must_use]
    pub fn with_range(mut self, range: CapabilityRange) -> Self {
        self.range = Some(range);
        self
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// A raw attribute that cannot feed the descriptor it is meant for.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AttributeProblem {
    #[error("attribute `{key}` is not a finite number")]
    NotNumeric { key: String },
    #[error("attribute `{key}` must be greater than zero")]
    NotPositive { key: String },
    #[error("range of `{name}` is inverted: min {min} exceeds max {max}")]
    InvertedRange { name: String, min: f64, max: f64 },
}

/// Whether a unit string denotes Fahrenheit.
#[must_use]
pub fn is_fahrenheit(unit: &str) -> bool {
    let unit = unit.trim();
    ["°F", "F", "fahrenheit"]
        .iter()
        .any(|candidate| unit.eq_ignore_ascii_case(candidate))
}

#[must_use]
pub fn fahrenheit_to_celsius(value: f64) -> f64 {
    (value - 32.0) * (5.0 / 9.0)
}

/// Infer the descriptors of one entity from its attributes.
///
/// Rules are tried in order; the first rule producing a descriptor for a
/// name wins.
#[must_use]
pub fn infer(
    attributes: &BTreeMap<String, AttributeValue>,
    rules: &[DescriptorRule],
) -> BTreeMap<String, AttributeDescriptor> {
    let mut descriptors = BTreeMap::new();
    for rule in rules {
        if descriptors.contains_key(&rule.name) || !applies(rule, attributes) {
            continue;
        }
        if let Some(mut descriptor) = derive(&rule.source, attributes) {
            descriptor.optional |= rule.optional;
            descriptors.insert(rule.name.clone(), descriptor);
        }
    }
    descriptors
}

/// Check the raw attributes an applicable rule reads.
#[must_use]
pub fn check(rule: &DescriptorRule, attributes: &BTreeMap<String, AttributeValue>) -> Vec<AttributeProblem> {
    if !applies(rule, attributes) {
        return Vec::new();
    }
    let mut problems: Vec<AttributeProblem> = numeric_keys(&rule.source)
        .into_iter()
        .filter(|key| attributes.get(*key).is_some_and(|value| value.as_f64().is_none()))
        .map(|key| AttributeProblem::NotNumeric {
            key: key.to_string(),
        })
        .collect();
    problems.extend(
        positive_keys(&rule.source)
            .into_iter()
            .filter(|key| number(attributes, key).is_some_and(|value| value <= 0.0))
            .map(|key| AttributeProblem::NotPositive {
                key: key.to_string(),
            }),
    );
    if let Some(range) = derive(&rule.source, attributes).and_then(|descriptor| descriptor.range)
        && range.is_inverted()
    {
        problems.push(AttributeProblem::InvertedRange {
            name: rule.name.clone(),
            min: range.min.unwrap_or_default(),
            max: range.max.unwrap_or_default(),
        });
    }
    problems
}

fn applies(rule: &DescriptorRule, attributes: &BTreeMap<String, AttributeValue>) -> bool {
    rule.when.is_empty() || rule.when.iter().any(|condition| holds(condition, attributes))
}

fn holds(condition: &Condition, attributes: &BTreeMap<String, AttributeValue>) -> bool {
    match condition {
        Condition::Present { key } => attributes.contains_key(key),
        Condition::ListContains { key, value } => attributes.get(key).is_some_and(|list| {
            list.as_list()
                .iter()
                .any(|item| item.eq_ignore_ascii_case(value))
        }),
    }
}

fn number(attributes: &BTreeMap<String, AttributeValue>, key: &str) -> Option<f64> {
    attributes.get(key).and_then(AttributeValue::as_f64)
}

fn text<'a>(attributes: &'a BTreeMap<String, AttributeValue>, key: &str) -> Option<&'a str> {
    match attributes.get(key) {
        Some(AttributeValue::String(value)) => Some(value.trim()).filter(|v| !v.is_empty()),
        _ => None,
    }
}

fn numeric_keys(source: &DescriptorSource) -> Vec<&str> {
    match source {
        DescriptorSource::RangeFromKeys {
            min_key,
            max_key,
            step_key,
            ..
        }
        | DescriptorSource::Temperature {
            min_key,
            max_key,
            step_key,
            ..
        } => vec![min_key.as_str(), max_key.as_str(), step_key.as_str()],
        DescriptorSource::KelvinFromMireds { min_key, max_key } => vec![min_key.as_str(), max_key.as_str()],
        _ => Vec::new(),
    }
}

fn positive_keys(source: &DescriptorSource) -> Vec<&str> {
    match source {
        DescriptorSource::RangeFromKeys { step_key, .. }
        | DescriptorSource::Temperature { step_key, .. } => vec![step_key.as_str()],
        DescriptorSource::KelvinFromMireds { min_key, max_key } => vec![min_key.as_str(), max_key.as_str()],
        _ => Vec::new(),
    }
}

fn derive(
    source: &DescriptorSource,
    attributes: &BTreeMap<String, AttributeValue>,
) -> Option<AttributeDescriptor> {
    match source {
        DescriptorSource::Boolean => Some(AttributeDescriptor::boolean()),
        DescriptorSource::Enum { list, fallback } => {
            let values = attributes.get(list).map(AttributeValue::as_list).unwrap_or_default();
            if !values.is_empty() {
                return Some(AttributeDescriptor::enumeration(values));
            }
            let one = fallback.as_deref().and_then(|key| text(attributes, key))?;
            Some(AttributeDescriptor::enumeration([one]))
        }
        DescriptorSource::Number { unit } => Some(AttributeDescriptor::number(Some(unit.as_str()))),
        DescriptorSource::FixedRange {
            unit,
            min,
            max,
            step,
        } => Some(
            AttributeDescriptor::number(Some(unit.as_str()))
                .with_range(CapabilityRange::new(*min, *max, *step)),
        ),
        DescriptorSource::RangeFromKeys {
            unit_key,
            min_key,
            max_key,
            step_key,
        } => {
            let min = number(attributes, min_key)?;
            let max = number(attributes, max_key);
            let unit = text(attributes, unit_key);
            if max.is_none() && unit.is_none() {
                return None;
            }
            let range = CapabilityRange {
                min: Some(min),
                max,
                step: Some(number(attributes, step_key).unwrap_or(DEFAULT_STEP)),
            };
            Some(AttributeDescriptor::number(unit).with_range(range))
        }
        DescriptorSource::Temperature {
            min_key,
            max_key,
            step_key,
            unit_key,
        } => {
            let mut range = CapabilityRange {
                min: number(attributes, min_key),
                max: number(attributes, max_key),
                step: Some(number(attributes, step_key).unwrap_or(TEMPERATURE_STEP)),
            };
            if text(attributes, unit_key).is_some_and(is_fahrenheit) {
                range.min = range.min.map(fahrenheit_to_celsius);
                range.max = range.max.map(fahrenheit_to_celsius);
                range.step = range.step.map(|step| step * (5.0 / 9.0));
            }
            Some(AttributeDescriptor::number(Some(CELSIUS)).with_range(range))
        }
        DescriptorSource::KelvinFromMireds { min_key, max_key } => {
            let min_mireds = number(attributes, min_key).filter(|v| *v > 0.0)?;
            let max_mireds = number(attributes, max_key).filter(|v| *v > 0.0)?;
            let range = CapabilityRange::new(
                MIREDS_PER_KELVIN / max_mireds,
                MIREDS_PER_KELVIN / min_mireds,
                COLOR_TEMP_STEP_K,
            );
            Some(AttributeDescriptor::number(Some(KELVIN)).with_range(range))
        }
    }
}
