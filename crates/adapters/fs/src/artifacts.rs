//! Artifact directory holding one manifest generation.
//!
//! All three artifacts are encoded in memory before anything touches the
//! disk. Each is then written to a temporary name, and only once every
//! temporary file is on disk are they renamed over the previous generation.
//! A failed write leaves the previous artifacts untouched.

use std::path::{Path, PathBuf};

use topomap_domain::codec;
use topomap_domain::lock::ManifestLock;
use topomap_domain::manifest::Manifest;
use topomap_domain::projection;

use crate::error::FsError;

pub const MANIFEST_BINARY_FILE: &str = "manifest.bin";
pub const MANIFEST_JSON_FILE: &str = "manifest.json";
pub const LOCK_FILE: &str = "manifest.lock.json";

const ARTIFACT_FILES: [&str; 3] = [MANIFEST_BINARY_FILE, MANIFEST_JSON_FILE, LOCK_FILE];

/// Raw artifact contents as found on disk.
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    pub binary: Vec<u8>,
    pub json: Option<String>,
    pub lock: Option<String>,
}

/// A directory of manifest artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactDir {
    dir: PathBuf,
}

impl ArtifactDir {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Write the binary manifest, its JSON projection and its lock file.
    ///
    /// # Errors
    ///
    /// Returns [`FsError`] if encoding fails (nothing is written) or the
    /// directory cannot be updated.
    #[tracing::instrument(skip(self, manifest), fields(dir = %self.dir.display(), version = %manifest.version))]
    pub async fn write(&self, manifest: &Manifest) -> Result<Vec<PathBuf>, FsError> {
        let binary = codec::encode(manifest)?;
        let json = projection::to_json(manifest)?;
        let lock = ManifestLock::from_manifest(manifest).to_json()?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(FsError::io(&self.dir))?;
        self.remove_leftovers().await?;

        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(ARTIFACT_FILES.len());
        for (name, content) in [
            (MANIFEST_BINARY_FILE, binary),
            (MANIFEST_JSON_FILE, json.into_bytes()),
            (LOCK_FILE, lock.into_bytes()),
        ] {
            let temp = self.dir.join(temp_name(name));
            if let Err(err) = tokio::fs::write(&temp, &content).await {
                discard(&staged).await;
                return Err(FsError::io(&temp)(err));
            }
            staged.push((temp, self.dir.join(name)));
        }

        let mut written = Vec::with_capacity(staged.len());
        for (index, (temp, target)) in staged.iter().enumerate() {
            if let Err(err) = tokio::fs::rename(temp, target).await {
                discard(&staged[index..]).await;
                return Err(FsError::io(target)(err));
            }
            written.push(target.clone());
        }
        tracing::info!(files = written.len(), "artifacts written");
        Ok(written)
    }

    /// Remove temporary files an interrupted write left behind.
    async fn remove_leftovers(&self) -> Result<(), FsError> {
        for name in ARTIFACT_FILES {
            let path = self.dir.join(temp_name(name));
            match tokio::fs::symlink_metadata(&path).await {
                Ok(metadata) if metadata.is_file() => {
                    tokio::fs::remove_file(&path)
                        .await
                        .map_err(FsError::io(&path))?;
                    tracing::debug!(path = %path.display(), "removed leftover temporary file");
                }
                Ok(_) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(FsError::io(&path)(err)),
            }
        }
        Ok(())
    }

    /// Read the artifacts; the JSON projection and lock are optional.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::Io`] if the binary manifest is missing or any
    /// present file cannot be read.
    pub async fn read(&self) -> Result<ArtifactBundle, FsError> {
        let binary_path = self.dir.join(MANIFEST_BINARY_FILE);
        let binary = tokio::fs::read(&binary_path)
            .await
            .map_err(FsError::io(&binary_path))?;
        Ok(ArtifactBundle {
            binary,
            json: read_optional(&self.dir.join(MANIFEST_JSON_FILE)).await?,
            lock: read_optional(&self.dir.join(LOCK_FILE)).await?,
        })
    }

    /// Decode the binary manifest.
    ///
    /// # Errors
    ///
    /// Returns [`FsError`] if the file is missing or not a valid encoding.
    pub async fn read_manifest(&self) -> Result<Manifest, FsError> {
        let path = self.dir.join(MANIFEST_BINARY_FILE);
        let bytes = tokio::fs::read(&path).await.map_err(FsError::io(&path))?;
        Ok(codec::decode(&bytes)?)
    }
}

fn temp_name(name: &str) -> String {
    format!(".{name}.tmp")
}

async fn discard(staged: &[(PathBuf, PathBuf)]) {
    for (temp, _) in staged {
        if let Err(err) = tokio::fs::remove_file(temp).await {
            tracing::warn!(path = %temp.display(), error = %err, "failed to remove temporary file");
        }
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>, FsError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(FsError::io(path)(err)),
    }
}

/// Load a manifest from an artifact directory, a binary file or a JSON
/// projection (`.json`).
///
/// # Errors
///
/// Returns [`FsError`] if the path cannot be read or decoded.
pub async fn load_manifest(path: &Path) -> Result<Manifest, FsError> {
    let metadata = tokio::fs::metadata(path).await.map_err(FsError::io(path))?;
    if metadata.is_dir() {
        return ArtifactDir::new(path).read_manifest().await;
    }
    if path.extension().is_some_and(|ext| ext == "json") {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(FsError::io(path))?;
        return Ok(projection::from_json(&json)?);
    }
    let bytes = tokio::fs::read(path).await.map_err(FsError::io(path))?;
    Ok(codec::decode(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use topomap_domain::entity::Entity;
    use topomap_domain::manifest::ManifestVersion;
    use topomap_domain::normalize::NormalizedGraph;
    use topomap_domain::schema::SchemaVersion;
    use topomap_domain::time::now;
    use topomap_domain::verify::verify_artifacts;

    fn manifest() -> Manifest {
        manifest_with_brightness(90)
    }

    fn manifest_with_brightness(brightness: i64) -> Manifest {
        let mut graph = NormalizedGraph::default();
        let entity = Entity::new("light", "light.porch").with_attribute("brightness", brightness);
        graph.entities.insert(entity.id.clone(), entity);
        Manifest::assemble(
            "home",
            ManifestVersion::INITIAL,
            SchemaVersion::V1,
            now(),
            graph,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn should_write_three_artifacts_that_verify_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = ArtifactDir::new(dir.path().join("out"));
        let written = artifacts.write(&manifest()).await.unwrap();
        assert_eq!(written.len(), 3);

        let bundle = artifacts.read().await.unwrap();
        let lock = ManifestLock::from_json(bundle.lock.as_deref().unwrap()).unwrap();
        let report = verify_artifacts(&bundle.binary, bundle.json.as_deref(), Some(&lock)).unwrap();
        assert!(report.is_ok(), "{:?}", report.problems);
    }

    #[tokio::test]
    async fn should_leave_no_temporary_files_behind() {
        let dir = tempfile::tempdir().unwrap();
        ArtifactDir::new(dir.path()).write(&manifest()).await.unwrap();

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec![MANIFEST_BINARY_FILE, MANIFEST_JSON_FILE, LOCK_FILE]);
    }

    #[tokio::test]
    async fn should_replace_stale_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(LOCK_FILE), "stale").unwrap();
        std::fs::write(dir.path().join(temp_name(MANIFEST_JSON_FILE)), "junk").unwrap();

        let artifacts = ArtifactDir::new(dir.path());
        artifacts.write(&manifest()).await.unwrap();

        let bundle = artifacts.read().await.unwrap();
        assert_ne!(bundle.lock.as_deref(), Some("stale"));
        assert!(!dir.path().join(temp_name(MANIFEST_JSON_FILE)).exists());
    }

    #[tokio::test]
    async fn should_keep_previous_generation_when_a_later_write_fails() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = ArtifactDir::new(dir.path());
        artifacts.write(&manifest()).await.unwrap();
        let previous: Vec<Vec<u8>> = ARTIFACT_FILES
            .iter()
            .map(|name| std::fs::read(dir.path().join(name)).unwrap())
            .collect();

        // The JSON projection is the second file staged.
        let blocker = dir.path().join(temp_name(MANIFEST_JSON_FILE));
        std::fs::create_dir(&blocker).unwrap();
        let result = artifacts.write(&manifest_with_brightness(10)).await;
        assert!(matches!(result, Err(FsError::Io { ref path, .. }) if *path == blocker));

        let current: Vec<Vec<u8>> = ARTIFACT_FILES
            .iter()
            .map(|name| std::fs::read(dir.path().join(name)).unwrap())
            .collect();
        assert_eq!(current, previous);
        assert!(!dir.path().join(temp_name(MANIFEST_BINARY_FILE)).exists());
        assert!(blocker.is_dir());
    }

    #[tokio::test]
    async fn should_read_bundle_without_optional_files() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = ArtifactDir::new(dir.path());
        artifacts.write(&manifest()).await.unwrap();
        std::fs::remove_file(dir.path().join(MANIFEST_JSON_FILE)).unwrap();
        std::fs::remove_file(dir.path().join(LOCK_FILE)).unwrap();

        let bundle = artifacts.read().await.unwrap();
        assert!(bundle.json.is_none());
        assert!(bundle.lock.is_none());
    }

    #[tokio::test]
    async fn should_return_io_error_when_binary_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let result = ArtifactDir::new(dir.path()).read().await;
        assert!(matches!(result, Err(FsError::Io { .. })));
    }

    #[tokio::test]
    async fn should_load_same_manifest_from_directory_binary_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let original = manifest();
        ArtifactDir::new(dir.path()).write(&original).await.unwrap();

        let from_dir = load_manifest(dir.path()).await.unwrap();
        let from_binary = load_manifest(&dir.path().join(MANIFEST_BINARY_FILE)).await.unwrap();
        let from_json = load_manifest(&dir.path().join(MANIFEST_JSON_FILE)).await.unwrap();
        assert_eq!(from_dir, original);
        assert_eq!(from_binary, original);
        assert_eq!(from_json, original);
    }

    #[tokio::test]
    async fn should_return_codec_error_when_binary_is_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.bin");
        std::fs::write(&path, b"nope").unwrap();
        let result = load_manifest(&path).await;
        assert!(matches!(result, Err(FsError::Codec(_))));
    }
}
