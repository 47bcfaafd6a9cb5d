//! Validate command
//!
//! Usage: topomap validate [DIR] [--json]
//!
//! Re-decodes `manifest.bin`, recomputes its checksum and cross-checks the
//! JSON projection and the lock file.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use serde::Serialize;
use topomap_adapter_fs::{ArtifactDir, LOCK_FILE, MANIFEST_JSON_FILE};
use topomap_domain::lock::ManifestLock;
use topomap_domain::verify::{VerificationProblem, verify_artifacts};

use crate::exit::Status;

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Artifact directory written by `topomap build`
    #[arg(default_value = "map")]
    pub dir: PathBuf,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Default, Serialize)]
struct ValidateSummary {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    checksum: Option<String>,
    problems: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<VerificationProblem>,
}

impl ValidateSummary {
    fn failed(problem: String) -> Self {
        Self {
            problems: vec![problem],
            ..Self::default()
        }
    }

    fn print(&self, json: bool) -> anyhow::Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(self)?);
            return Ok(());
        }
        for problem in &self.problems {
            println!("FAIL {problem}");
        }
        if self.ok {
            println!(
                "ok manifest {} checksum {}",
                self.version.as_deref().unwrap_or_default(),
                self.checksum.as_deref().unwrap_or_default()
            );
        }
        Ok(())
    }
}

/// Execute validate command
///
/// # Errors
///
/// Returns an error when the artifact directory cannot be read at all.
pub async fn execute(args: ValidateArgs) -> anyhow::Result<Status> {
    let bundle = ArtifactDir::new(&args.dir)
        .read()
        .await
        .with_context(|| format!("failed to read artifacts in `{}`", args.dir.display()))?;

    let summary = check(&bundle.binary, bundle.json.as_deref(), bundle.lock.as_deref());
    summary.print(args.json)?;

    if summary.ok {
        tracing::info!(dir = %args.dir.display(), "artifacts verified");
        Ok(Status::Success)
    } else {
        tracing::warn!(dir = %args.dir.display(), problems = summary.problems.len(), "artifacts inconsistent");
        Ok(Status::ValidationFailed)
    }
}

fn check(binary: &[u8], json: Option<&str>, lock: Option<&str>) -> ValidateSummary {
    let lock = match lock.map(ManifestLock::from_json).transpose() {
        Ok(lock) => lock,
        Err(err) => return ValidateSummary::failed(format!("{LOCK_FILE} is unreadable: {err}")),
    };
    let report = match verify_artifacts(binary, json, lock.as_ref()) {
        Ok(report) => report,
        Err(err) => {
            let err = anyhow::Error::from(err);
            return ValidateSummary::failed(format!("manifest cannot be decoded: {err:#}"));
        }
    };

    let mut problems: Vec<String> = report.problems.iter().map(ToString::to_string).collect();
    if json.is_none() {
        problems.push(format!("{MANIFEST_JSON_FILE} is missing"));
    }
    if lock.is_none() {
        problems.push(format!("{LOCK_FILE} is missing"));
    }

    ValidateSummary {
        ok: problems.is_empty(),
        version: Some(report.manifest.version.to_string()),
        checksum: Some(report.manifest.checksum.to_string()),
        problems,
        details: report.problems,
    }
}
