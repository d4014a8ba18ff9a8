//! Interfaces of the download pipelines and the library loader.
//!
//! All calls are blocking and run on the caller's thread. Callbacks fire
//! synchronously from inside the call.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

use super::events::ProgressEvent;

/// Source of the default asset bundle and the extras blobs.
pub trait ResourceDownloadManager {
    /// Content hash of the remote default asset bundle.
    fn hash(&self) -> Result<String>;

    /// Download the default asset bundle into `target`, reporting progress.
    fn download_resources<F>(&self, target: &Path, on_progress: F) -> Result<()>
    where
        F: FnMut(ProgressEvent);

    /// Fetch the extras blobs.
    ///
    /// `on_clear` fires once before the first `on_entry`, which then fires once
    /// per blob.
    fn download_extras<C, E>(&self, on_clear: C, on_entry: E) -> Result<()>
    where
        C: FnOnce(),
        E: FnMut(String, Vec<u8>);
}

/// Source of the native support libraries.
pub trait LibraryDownloadManager {
    /// Content hash of the remote library bundle.
    fn hash(&self) -> Result<String>;

    /// Download missing or changed artifacts into `target`.
    ///
    /// `on_result` receives the outcome for each artifact; a single failure must
    /// not abort the batch.
    fn download_libraries<F>(&self, target: &Path, on_result: F) -> Result<()>
    where
        F: FnMut(bool, &str);
}

/// Loads library artifacts into the running process.
pub trait LibraryLoader {
    /// Load one artifact.
    fn load(&self, artifact: &Path) -> Result<()>;

    /// Attempt to load every artifact in `folder`, reporting each outcome.
    ///
    /// A failing artifact does not stop the remaining ones from being tried.
    fn load_libraries<F>(&self, folder: &Path, mut on_result: F) -> Result<()>
    where
        F: FnMut(&Path, Option<&anyhow::Error>),
    {
        for artifact in artifacts_in(folder)? {
            match self.load(&artifact) {
                Ok(()) => on_result(&artifact, None),
                Err(err) => on_result(&artifact, Some(&err)),
            }
        }
        Ok(())
    }
}

/// Files directly inside `folder`, sorted by name.
pub fn artifacts_in(folder: &Path) -> Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        return Ok(Vec::new());
    }

    let mut artifacts = Vec::new();
    for entry in WalkDir::new(folder).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry =
            entry.with_context(|| format!("failed to scan library folder {}", folder.display()))?;
        if entry.file_type().is_file() {
            artifacts.push(entry.into_path());
        }
    }
    Ok(artifacts)
}
