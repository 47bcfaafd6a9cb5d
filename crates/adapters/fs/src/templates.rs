//! Template directory loading and rendered output.

use std::path::{Path, PathBuf};

use topomap_domain::render::{RenderedArtifact, Template};

use crate::error::FsError;

/// Load every `*.tmpl` file of `dir`, ordered by file name.
///
/// Other files are ignored.
///
/// # Errors
///
/// Returns [`FsError::Io`] if the directory or a template cannot be read.
pub async fn load_templates(dir: &Path) -> Result<Vec<Template>, FsError> {
    let mut entries = tokio::fs::read_dir(dir).await.map_err(FsError::io(dir))?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(FsError::io(dir))? {
        let path = entry.path();
        let file_type = entry.file_type().await.map_err(FsError::io(&path))?;
        if let Some(name) = path.file_name().and_then(|name| name.to_str())
            && file_type.is_file()
        {
            files.push((name.to_string(), path.clone()));
        }
    }
    files.sort();

    let mut templates = Vec::with_capacity(files.len());
    for (name, path) in files {
        let source = tokio::fs::read_to_string(&path)
            .await
            .map_err(FsError::io(&path))?;
        if let Some(template) = Template::from_file_name(&name, source) {
            templates.push(template);
        }
    }
    tracing::debug!(dir = %dir.display(), count = templates.len(), "templates loaded");
    Ok(templates)
}

/// Where a rendered artifact lands: `<out>/<template key>/<entity id>`,
/// with `:` replaced so the name is portable.
#[must_use]
pub fn output_path(out: &Path, artifact: &RenderedArtifact) -> PathBuf {
    out.join(&artifact.template)
        .join(artifact.entity_id.as_str().replace(':', "_"))
}

/// Write rendered artifacts below `out`.
///
/// # Errors
///
/// Returns [`FsError::Io`] on the first file that cannot be written.
pub async fn write_rendered(
    out: &Path,
    artifacts: &[RenderedArtifact],
) -> Result<Vec<PathBuf>, FsError> {
    let mut written = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let path = output_path(out, artifact);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(FsError::io(parent))?;
        }
        tokio::fs::write(&path, &artifact.content)
            .await
            .map_err(FsError::io(&path))?;
        written.push(path);
    }
    Ok(written)
}
