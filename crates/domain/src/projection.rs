//! JSON projection of a manifest, for humans and audits.

use crate::manifest::Manifest;

#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("invalid manifest JSON")]
    Json(#[from] serde_json::Error),
    #[error("non-canonical {0} in JSON projection")]
    NonCanonical(&'static str),
}

/// Render the manifest as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`ProjectionError::Json`] if serialization fails.
pub fn to_json(manifest: &Manifest) -> Result<String, ProjectionError> {
    Ok(serde_json::to_string_pretty(manifest)?)
}

/// Read a manifest back from its JSON projection.
///
/// # Errors
///
/// Returns [`ProjectionError`] when the JSON is malformed or its item sets
/// are not sorted by id.
pub fn from_json(json: &str) -> Result<Manifest, ProjectionError> {
    let manifest: Manifest = serde_json::from_str(json)?;
    if !manifest.is_canonical() {
        return Err(ProjectionError::NonCanonical("item order"));
    }
    let checksum = manifest.checksum.as_str();
    if checksum.len() != 64 || !checksum.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return Err(ProjectionError::NonCanonical("checksum"));
    }
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::descriptor::{AttributeDescriptor, CapabilityRange, fahrenheit_to_celsius};
    use crate::entity::Entity;
    use crate::manifest::ManifestVersion;
    use crate::normalize::NormalizedGraph;
    use crate::schema::{CELSIUS, SchemaVersion};
    use crate::service::{Service, ServiceField};
    use crate::time::now;

    fn sample() -> Manifest {
        let mut graph = NormalizedGraph::default();
        for entity in [
            Entity::new("climate", "hall")
                .with_attribute("min_temp", 7.0)
                .with_attribute("max_temp", 30.5)
                .with_attribute("hvac_modes", "heat,off")
                .with_attribute("precision", 1_i64)
                .with_descriptor(
                    "target_temp_c",
                    AttributeDescriptor::number(Some(CELSIUS)).with_range(CapabilityRange::new(
                        fahrenheit_to_celsius(45.0),
                        fahrenheit_to_celsius(87.0),
                        5.0 / 9.0,
                    )),
                ),
            Entity::new("switch", "pump").with_attribute("inverted", true),
        ] {
            graph.entities.insert(entity.id.clone(), entity);
        }
        let service = Service::new("climate", "set_temperature")
            .with_field("temperature", ServiceField::new("number").with_unit(CELSIUS).required());
        graph.services.insert(service.key(), service);
        Manifest::assemble("home", ManifestVersion::INITIAL, SchemaVersion::V1, now(), graph)
            .unwrap()
    }

    #[test]
    fn should_roundtrip_through_json() {
        let manifest = sample();
        let json = to_json(&manifest).unwrap();
        assert_eq!(from_json(&json).unwrap(), manifest);
    }

    #[test]
    fn should_preserve_checksum_from_binary_to_json_to_binary() {
        let manifest = sample();
        let bytes = codec::encode(&manifest).unwrap();
        let json = to_json(&codec::decode(&bytes).unwrap()).unwrap();
        let back = from_json(&json).unwrap();
        assert!(back.verify_checksum());
        assert_eq!(codec::encode(&back).unwrap(), bytes);
    }

    #[test]
    fn should_keep_integral_float_as_float() {
        let json = to_json(&sample()).unwrap();
        assert!(json.contains("\"min_temp\": 7.0"));
        assert!(json.contains("\"precision\": 1"));
    }

    #[test]
    fn should_reject_unsorted_entities() {
        let mut manifest = sample();
        manifest.entities.reverse();
        let json = to_json(&manifest).unwrap();
        assert!(matches!(
            from_json(&json),
            Err(ProjectionError::NonCanonical("item order"))
        ));
    }

    #[test]
    fn should_reject_malformed_json() {
        assert!(matches!(from_json("{"), Err(ProjectionError::Json(_))));
    }
}
