//! Summary statistics of a manifest.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::entity::ValidationStatus;
use crate::manifest::Manifest;

/// How many entities carry a given `domain.attribute`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeCoverage {
    pub key: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestStats {
    pub lineage: String,
    pub version: String,
    pub entities: usize,
    pub devices: usize,
    pub areas: usize,
    pub services: usize,
    /// Entities carrying at least one typed descriptor.
    pub described: usize,
    pub by_domain: BTreeMap<String, usize>,
    pub by_status: BTreeMap<ValidationStatus, usize>,
    /// Most common attributes, most frequent first.
    pub top_attributes: Vec<AttributeCoverage>,
}

/// Count entities by domain and status and rank attribute coverage.
#[must_use]
pub fn stats(manifest: &Manifest, top: usize) -> ManifestStats {
    let mut by_domain = BTreeMap::new();
    let mut by_status = BTreeMap::new();
    let mut attributes: BTreeMap<String, usize> = BTreeMap::new();
    for entity in &manifest.entities {
        *by_domain.entry(entity.domain.clone()).or_insert(0) += 1;
        *by_status.entry(entity.status).or_insert(0) += 1;
        for key in entity.attributes.keys() {
            *attributes
                .entry(format!("{}.{key}", entity.domain))
                .or_insert(0) += 1;
        }
    }

    let mut top_attributes: Vec<AttributeCoverage> = attributes
        .into_iter()
        .map(|(key, count)| AttributeCoverage { key, count })
        .collect();
    top_attributes.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    top_attributes.truncate(top);

    ManifestStats {
        lineage: manifest.lineage.clone(),
        version: manifest.version.to_string(),
        entities: manifest.entities.len(),
        devices: manifest.devices.len(),
        areas: manifest.areas.len(),
        services: manifest.services.len(),
        described: manifest
            .entities
            .iter()
            .filter(|entity| !entity.descriptors.is_empty())
            .count(),
        by_domain,
        by_status,
        top_attributes,
    }
}
