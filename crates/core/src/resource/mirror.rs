use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{
    collaborators::{LibraryDownloadManager, LibraryLoader, ResourceDownloadManager},
    events::ProgressEvent,
};

/// Extensions accepted by [`ArtifactRegistry`].
pub const LIBRARY_EXTENSIONS: &[&str] = &["jar", "so", "dll", "dylib"];

/// Serves bundles from a local directory tree.
///
/// Expected layout: `assets/` holds the default asset bundle, `extras/` the
/// extras blobs (keyed by relative path) and `libs/` the library artifacts.
#[derive(Debug, Clone)]
pub struct DirectoryMirror {
    root: PathBuf,
}

impl DirectoryMirror {
    /// Mirror rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn assets_dir(&self) -> PathBuf {
        self.root.join("assets")
    }

    fn extras_dir(&self) -> PathBuf {
        self.root.join("extras")
    }

    fn libs_dir(&self) -> PathBuf {
        self.root.join("libs")
    }
}

impl ResourceDownloadManager for DirectoryMirror {
    fn hash(&self) -> Result<String> {
        tree_hash(&self.assets_dir())
    }

    fn download_resources<F>(&self, target: &Path, mut on_progress: F) -> Result<()>
    where
        F: FnMut(ProgressEvent),
    {
        let files = tree_files(&self.assets_dir())?;
        let total = files.len().max(1) as f64;
        for (index, (name, source)) in files.iter().enumerate() {
            let dest = target.join(name);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            fs::copy(source, &dest).with_context(|| {
                format!("failed to copy {} to {}", source.display(), dest.display())
            })?;
            on_progress(ProgressEvent::Download {
                name: name.clone(),
                percentage: (index + 1) as f64 / total * 100.0,
            });
        }
        on_progress(ProgressEvent::Done);
        Ok(())
    }

    fn download_extras<C, E>(&self, on_clear: C, mut on_entry: E) -> Result<()>
    where
        C: FnOnce(),
        E: FnMut(String, Vec<u8>),
    {
        // read everything first so an I/O error leaves the previous extras intact
        let mut blobs = Vec::new();
        for (key, path) in tree_files(&self.extras_dir())? {
            let bytes =
                fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
            blobs.push((key, bytes));
        }

        on_clear();
        for (key, bytes) in blobs {
            on_entry(key, bytes);
        }
        Ok(())
    }
}

impl LibraryDownloadManager for DirectoryMirror {
    fn hash(&self) -> Result<String> {
        tree_hash(&self.libs_dir())
    }

    fn download_libraries<F>(&self, target: &Path, mut on_result: F) -> Result<()>
    where
        F: FnMut(bool, &str),
    {
        fs::create_dir_all(target)
            .with_context(|| format!("failed to create {}", target.display()))?;

        for source in super::collaborators::artifacts_in(&self.libs_dir())? {
            let Some(name) = source.file_name().map(|n| n.to_string_lossy().to_string()) else {
                continue;
            };
            let dest = target.join(&name);
            if dest.is_file() && file_digest(&dest).ok() == file_digest(&source).ok() {
                debug!("library {name} already current");
                continue;
            }
            match fs::copy(&source, &dest) {
                Ok(_) => on_result(true, &name),
                Err(err) => {
                    warn!("failed to copy library {}: {err}", source.display());
                    on_result(false, &name);
                }
            }
        }
        Ok(())
    }
}

/// Library loader that verifies artifacts and records their digests.
#[derive(Debug, Default)]
pub struct ArtifactRegistry {
    loaded: RwLock<BTreeMap<String, String>>,
}

impl ArtifactRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loaded artifact names with their SHA-256 digests.
    pub fn loaded(&self) -> Vec<(String, String)> {
        self.loaded
            .read()
            .iter()
            .map(|(name, digest)| (name.clone(), digest.clone()))
            .collect()
    }

    /// Whether `name` has been loaded.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.read().contains_key(name)
    }
}

impl LibraryLoader for ArtifactRegistry {
    fn load(&self, artifact: &Path) -> Result<()> {
        let extension = artifact
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !LIBRARY_EXTENSIONS.contains(&extension.as_str()) {
            bail!("unsupported library artifact {}", artifact.display());
        }

        let metadata = fs::metadata(artifact)
            .with_context(|| format!("failed to stat {}", artifact.display()))?;
        if metadata.len() == 0 {
            bail!("library artifact {} is empty", artifact.display());
        }

        let digest = file_digest(artifact)?;
        let name = artifact
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.loaded.write().insert(name, digest);
        Ok(())
    }
}

/// Hex SHA-256 of a file.
pub fn file_digest(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Hex SHA-256 over the sorted relative paths and contents of a tree.
///
/// A missing directory hashes like an empty one.
pub fn tree_hash(dir: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    for (name, path) in tree_files(dir)? {
        let bytes = fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(&bytes);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn tree_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(dir)
            .with_context(|| format!("{} escaped {}", entry.path().display(), dir.display()))?;
        let name = relative
            .components()
            .map(|part| part.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push((name, entry.into_path()));
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn tree_hash_tracks_names_and_contents() -> Result<()> {
        let dir = tempdir()?;
        let empty = tree_hash(&dir.path().join("missing"))?;
        assert_eq!(empty, tree_hash(dir.path())?);

        fs::write(dir.path().join("a.txt"), "one")?;
        let first = tree_hash(dir.path())?;
        assert_ne!(first, empty);

        fs::write(dir.path().join("a.txt"), "two")?;
        let second = tree_hash(dir.path())?;
        assert_ne!(first, second);

        fs::rename(dir.path().join("a.txt"), dir.path().join("b.txt"))?;
        assert_ne!(second, tree_hash(dir.path())?);
        Ok(())
    }

    #[test]
    fn library_copy_skips_current_artifacts() -> Result<()> {
        let source = tempdir()?;
        let target = tempdir()?;
        fs::create_dir_all(source.path().join("libs"))?;
        fs::write(source.path().join("libs/a.jar"), "a")?;
        fs::write(source.path().join("libs/b.jar"), "b")?;
        fs::write(target.path().join("a.jar"), "a")?;

        let mirror = DirectoryMirror::new(source.path());
        let mut results = Vec::new();
        mirror.download_libraries(target.path(), |ok, name| results.push((ok, name.to_string())))?;
        assert_eq!(results, vec![(true, "b.jar".to_string())]);
        Ok(())
    }

    #[test]
    fn registry_rejects_unknown_and_empty_artifacts() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("good.jar"), "payload")?;
        fs::write(dir.path().join("empty.so"), "")?;
        fs::write(dir.path().join("notes.txt"), "hi")?;

        let registry = ArtifactRegistry::new();
        let mut outcomes = Vec::new();
        registry.load_libraries(dir.path(), |artifact, err| {
            outcomes.push((
                artifact.file_name().map(|n| n.to_string_lossy().to_string()),
                err.is_none(),
            ))
        })?;

        assert_eq!(
            outcomes,
            vec![
                (Some("empty.so".to_string()), false),
                (Some("good.jar".to_string()), true),
                (Some("notes.txt".to_string()), false),
            ]
        );
        assert!(registry.is_loaded("good.jar"));
        assert_eq!(registry.loaded().len(), 1);
        Ok(())
    }
}
