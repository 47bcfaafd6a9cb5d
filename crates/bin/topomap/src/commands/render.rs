//! Render command
//!
//! Usage: topomap render <MANIFEST> [--templates <DIR>] [--out <DIR>]
//!
//! A template that fails for one entity is reported and skipped; the rest
//! are still rendered.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use topomap_adapter_fs::{load_manifest, load_templates, write_rendered};
use topomap_domain::render::render;

use crate::exit::Status;

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Artifact directory, `manifest.bin` or `manifest.json`
    #[arg(default_value = "map")]
    pub manifest: PathBuf,

    /// Directory of `<name>[.<domain>].tmpl` files
    #[arg(long, value_name = "DIR", default_value = "templates")]
    pub templates: PathBuf,

    /// Directory receiving rendered files
    #[arg(short, long, value_name = "DIR", default_value = "rendered")]
    pub out: PathBuf,
}

/// Execute render command
///
/// # Errors
///
/// Returns an error when the manifest or templates cannot be loaded, or an
/// output file cannot be written.
pub async fn execute(args: RenderArgs) -> anyhow::Result<Status> {
    let manifest = load_manifest(&args.manifest)
        .await
        .with_context(|| format!("failed to load `{}`", args.manifest.display()))?;
    let templates = load_templates(&args.templates)
        .await
        .with_context(|| format!("failed to load templates from `{}`", args.templates.display()))?;

    let output = render(&manifest, &templates);
    let written = write_rendered(&args.out, &output.artifacts)
        .await
        .context("failed to write rendered output")?;

    for error in &output.errors {
        eprintln!("render error: {error}");
    }
    println!(
        "rendered {} files from {} templates, {} errors",
        written.len(),
        templates.len(),
        output.errors.len()
    );

    if output.errors.is_empty() {
        Ok(Status::Success)
    } else {
        tracing::warn!(errors = output.errors.len(), "some templates failed to render");
        Ok(Status::ValidationFailed)
    }
}
