//! Build command
//!
//! Usage: topomap build (--demo | --snapshot <FILE>) [--out <DIR>] [--lineage <NAME>]
//!        [--mode strict|lenient] [--schema-version <M.m>] [--schema-dir <DIR>] [--store <URL>]

use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgGroup, Args};
use serde::Serialize;
use topomap_adapter_fs::ArtifactDir;
use topomap_adapter_storage_sqlite_sqlx::{Config as StoreConfig, SqliteManifestStore};
use topomap_app::services::{BuildReport, BuildRequest, BuildService};
use topomap_domain::id::EntityId;
use topomap_domain::issue::ValidationIssue;
use topomap_domain::manifest::ChangeScope;
use topomap_domain::schema::SchemaVersion;
use topomap_domain::validate::ValidationMode;

use crate::config::Config;
use crate::exit::Status;
use crate::wiring::{Discovery, Schemas};

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("source").required(true).args(["demo", "snapshot"])))]
pub struct BuildArgs {
    /// Use the built-in demo topology
    #[arg(long)]
    pub demo: bool,

    /// Read the topology from a JSON snapshot file
    #[arg(long, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,

    /// Directory receiving the manifest artifacts
    #[arg(short, long, default_value = "map")]
    pub out: PathBuf,

    /// Lineage to append the generation to
    #[arg(long)]
    pub lineage: Option<String>,

    /// Validation mode (strict or lenient)
    #[arg(long)]
    pub mode: Option<ValidationMode>,

    /// Schema version to validate against (major.minor)
    #[arg(long)]
    pub schema_version: Option<SchemaVersion>,

    /// Directory of schema-v<major>.<minor>.toml files
    #[arg(long, value_name = "DIR")]
    pub schema_dir: Option<PathBuf>,

    /// Manifest store URL
    #[arg(long, value_name = "URL")]
    pub store: Option<String>,

    /// Print the build summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct BuildSummary<'a> {
    lineage: &'a str,
    version: String,
    sequence: u64,
    checksum: &'a str,
    scope: ChangeScope,
    unchanged: bool,
    entities: usize,
    excluded: &'a [EntityId],
    issues: &'a [ValidationIssue],
}

impl<'a> BuildSummary<'a> {
    fn new(report: &'a BuildReport) -> Self {
        let manifest = report.outcome.manifest();
        Self {
            lineage: &manifest.lineage,
            version: manifest.version.semver(),
            sequence: manifest.version.sequence,
            checksum: manifest.checksum.as_str(),
            scope: report.outcome.scope(),
            unchanged: report.outcome.is_unchanged(),
            entities: manifest.entities.len(),
            excluded: &report.excluded,
            issues: &report.report.issues,
        }
    }

    fn print_text(&self) {
        for issue in self.issues {
            println!("{issue}");
        }
        let state = if self.unchanged {
            "unchanged".to_string()
        } else {
            format!("{} change", self.scope)
        };
        println!(
            "manifest {} {}+{} ({state}): {} entities, {} excluded, checksum {}",
            self.lineage,
            self.version,
            self.sequence,
            self.entities,
            self.excluded.len(),
            self.checksum
        );
    }
}

/// Execute build command
///
/// # Errors
///
/// Returns the pipeline error when discovery, schema loading or persistence
/// fails; nothing is written to `--out` in that case.
pub async fn execute(args: BuildArgs, config: &Config) -> anyhow::Result<Status> {
    let lineage = args.lineage.unwrap_or_else(|| config.build.lineage.clone());
    anyhow::ensure!(!lineage.trim().is_empty(), "lineage must not be empty");
    let request = BuildRequest::new(lineage)
        .with_mode(args.mode.unwrap_or(config.build.mode))
        .with_schema_version(args.schema_version.unwrap_or(config.build.schema_version));

    let database_url = args.store.unwrap_or_else(|| config.store.url.clone());
    let db = StoreConfig { database_url }
        .build()
        .await
        .context("failed to open manifest store")?;

    let discovery = Discovery::select(if args.demo { None } else { args.snapshot });
    let schemas = Schemas::select(args.schema_dir.or_else(|| config.build.schema_dir.clone()));
    let store = SqliteManifestStore::new(db.pool().clone());
    let service = BuildService::new(discovery, schemas, store);

    let report = service.build(&request).await?;

    ArtifactDir::new(&args.out)
        .write(report.outcome.manifest())
        .await
        .with_context(|| format!("failed to write artifacts to `{}`", args.out.display()))?;

    let summary = BuildSummary::new(&report);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        summary.print_text();
    }

    if report.has_errors() {
        tracing::warn!(
            errors = report.report.error_count(),
            "build finished with validation errors"
        );
        Ok(Status::ValidationFailed)
    } else {
        Ok(Status::Success)
    }
}
