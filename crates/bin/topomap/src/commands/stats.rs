//! Stats command
//!
//! Usage: topomap stats <MANIFEST> [--top <N>] [--json]

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use topomap_adapter_fs::load_manifest;
use topomap_domain::stats::{ManifestStats, stats};

use crate::exit::Status;

#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Artifact directory, `manifest.bin` or `manifest.json`
    #[arg(default_value = "map")]
    pub manifest: PathBuf,

    /// Number of attributes to list
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Print the statistics as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute stats command
///
/// # Errors
///
/// Returns an error when the manifest cannot be loaded.
pub async fn execute(args: StatsArgs) -> anyhow::Result<Status> {
    let manifest = load_manifest(&args.manifest)
        .await
        .with_context(|| format!("failed to load `{}`", args.manifest.display()))?;
    let stats = stats(&manifest, args.top);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print!("{}", format_text(&stats));
    }
    Ok(Status::Success)
}

fn format_text(stats: &ManifestStats) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    let _ = writeln!(out, "lineage:  {}", stats.lineage);
    let _ = writeln!(out, "version:  {}", stats.version);
    let _ = writeln!(
        out,
        "entities: {}  devices: {}  areas: {}  services: {}",
        stats.entities, stats.devices, stats.areas, stats.services
    );
    let _ = writeln!(out, "described: {}", stats.described);
    out.push_str("by domain:\n");
    for (domain, count) in &stats.by_domain {
        let _ = writeln!(out, "  {domain:<24} {count}");
    }
    out.push_str("by status:\n");
    for (status, count) in &stats.by_status {
        let _ = writeln!(out, "  {:<24} {count}", status.to_string());
    }
    out.push_str("top attributes:\n");
    for coverage in &stats.top_attributes {
        let _ = writeln!(out, "  {:<24} {}", coverage.key, coverage.count);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use topomap_domain::entity::Entity;
    use topomap_domain::manifest::{Manifest, ManifestVersion};
    use topomap_domain::normalize::NormalizedGraph;
    use topomap_domain::schema::SchemaVersion;
    use topomap_domain::time::now;

    #[test]
    fn should_list_domains_and_attributes_in_text_output() {
        let mut graph = NormalizedGraph::default();
        for (domain, uid) in [("light", "light.porch"), ("light", "light.hall"), ("switch", "switch.kettle")] {
            let entity = Entity::new(domain, uid).with_attribute("friendly", true);
            graph.entities.insert(entity.id.clone(), entity);
        }
        let manifest =
            Manifest::assemble("home", ManifestVersion::INITIAL, SchemaVersion::V1, now(), graph)
                .unwrap();

        let text = format_text(&stats(&manifest, 5));
        assert!(text.contains("lineage:  home"));
        assert!(text.contains("entities: 3  devices: 0  areas: 0  services: 0"));
        assert!(text.contains("described: 0"));
        assert!(text.lines().any(|line| line.trim_start().starts_with("light") && line.ends_with('2')));
        assert!(text.contains("light.friendly"));
    }
}
