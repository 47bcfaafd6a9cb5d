//! Diff command
//!
//! Usage: topomap diff <OLD> <NEW>
//!
//! Each side is an artifact directory, a `manifest.bin` or a `manifest.json`.
//! The result is printed as JSON.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use serde::Serialize;
use topomap_adapter_fs::load_manifest;
use topomap_domain::diff::{ManifestDiff, diff};
use topomap_domain::error::MapError;
use topomap_domain::manifest::ChangeScope;

use crate::exit::Status;

#[derive(Debug, Args)]
pub struct DiffArgs {
    /// Older manifest
    pub old: PathBuf,
    /// Newer manifest
    pub new: PathBuf,
}

#[derive(Debug, Serialize)]
struct DiffOutput {
    scope: ChangeScope,
    #[serde(flatten)]
    diff: ManifestDiff,
}

/// Execute diff command
///
/// # Errors
///
/// Returns [`MapError::SchemaIncompatible`] when the manifests were built
/// against different schema majors.
pub async fn execute(args: DiffArgs) -> anyhow::Result<Status> {
    let old = load_manifest(&args.old)
        .await
        .with_context(|| format!("failed to load `{}`", args.old.display()))?;
    let new = load_manifest(&args.new)
        .await
        .with_context(|| format!("failed to load `{}`", args.new.display()))?;

    let diff = diff(&old, &new).map_err(MapError::from)?;
    let output = DiffOutput {
        scope: diff.change_scope(),
        diff,
    };
    tracing::info!(scope = %output.scope, "manifests compared");
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(Status::Success)
}
