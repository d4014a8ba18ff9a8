use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::{
    collaborators::{LibraryDownloadManager, LibraryLoader, ResourceDownloadManager},
    decision::{decide, SyncReason},
    events::Observers,
    extras::ExtrasStore,
};
use crate::{
    config::AppConfig,
    manifest::{self, Category, Manifest},
};

/// On-disk layout below the data root.
#[derive(Debug, Clone)]
pub struct AssetLayout {
    root: PathBuf,
}

impl AssetLayout {
    /// Layout rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The data root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of `hashes.json`.
    pub fn manifest_path(&self) -> PathBuf {
        manifest::manifest_path(&self.root)
    }

    /// Folder receiving the default asset bundle. Owned by the coordinator.
    pub fn default_assets(&self) -> PathBuf {
        self.root.join("built-in").join("Default")
    }

    /// Folder receiving library artifacts.
    pub fn libraries(&self) -> PathBuf {
        self.root.join("libs")
    }
}

/// Per-call switches for the asset flow.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Resync even when hash and version match.
    pub force: bool,
    /// Wipe the default asset folder before a resync.
    pub clean: bool,
}

/// Last hashes seen by the coordinator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    /// Hash of the default asset bundle.
    pub default_hash: Option<String>,
    /// Hash of the library bundle.
    pub libs_hash: Option<String>,
}

/// Outcome of a completed asset flow.
#[derive(Debug, Clone)]
pub struct AssetSyncReport {
    /// Remote hash now recorded in the manifest.
    pub hash: String,
    /// Why the bundle was downloaded, `None` when it was up to date.
    pub reason: Option<SyncReason>,
    /// Whether the asset folder was wiped first.
    pub cleaned: bool,
    /// Number of extras blobs after the refresh.
    pub extras: usize,
    /// Completion time.
    pub completed_at: DateTime<Utc>,
}

/// Outcome of a completed library flow.
#[derive(Debug, Clone)]
pub struct LibrarySyncReport {
    /// Remote hash now recorded in the manifest.
    pub hash: String,
    /// Why the libraries were downloaded, `None` when up to date.
    pub reason: Option<SyncReason>,
    /// Artifacts downloaded successfully.
    pub downloaded: Vec<String>,
    /// Artifacts that failed to download.
    pub download_failed: Vec<String>,
    /// Artifacts loaded successfully.
    pub loaded: Vec<PathBuf>,
    /// Artifacts that failed to load.
    pub load_failed: Vec<PathBuf>,
    /// Completion time.
    pub completed_at: DateTime<Utc>,
}

/// Keeps the default assets, extras and libraries up to date.
///
/// The asset flow and the extras-only reload share one gate; the library flow
/// has its own. Gates are only ever try-acquired: a call that finds its gate
/// held returns `Ok(None)` without touching anything. Manifest updates from
/// either flow go through a short internal lock so neither loses the other's
/// entry.
pub struct SyncCoordinator {
    layout: AssetLayout,
    host_version: String,
    reduced_info: bool,
    extras: ExtrasStore,
    state: RwLock<SyncState>,
    asset_gate: Mutex<()>,
    library_gate: Mutex<()>,
    manifest_lock: Mutex<()>,
}

impl SyncCoordinator {
    /// Create a coordinator for `layout` on behalf of host `host_version`.
    pub fn new(layout: AssetLayout, host_version: impl Into<String>) -> Self {
        Self {
            layout,
            host_version: host_version.into(),
            reduced_info: false,
            extras: ExtrasStore::new(),
            state: RwLock::new(SyncState::default()),
            asset_gate: Mutex::new(()),
            library_gate: Mutex::new(()),
            manifest_lock: Mutex::new(()),
        }
    }

    /// Create a coordinator from configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(AssetLayout::new(&config.data_root), &config.host_version)
            .with_reduced_info(config.reduced_download_info)
    }

    /// Only report the terminal progress event.
    pub fn with_reduced_info(mut self, reduced: bool) -> Self {
        self.reduced_info = reduced;
        self
    }

    /// Refresh `extras` instead of a private store.
    pub fn with_extras(mut self, extras: ExtrasStore) -> Self {
        self.extras = extras;
        self
    }

    /// The folder layout.
    pub fn layout(&self) -> &AssetLayout {
        &self.layout
    }

    /// Handle to the extras blobs.
    pub fn extras(&self) -> &ExtrasStore {
        &self.extras
    }

    /// Snapshot of the last seen hashes.
    pub fn state(&self) -> SyncState {
        self.state.read().clone()
    }

    /// Sync the default assets if stale, then refresh extras.
    ///
    /// Returns `Ok(None)` when another asset sync is in flight.
    pub fn sync_assets<R>(
        &self,
        source: &R,
        options: SyncOptions,
        observers: &Observers,
    ) -> Result<Option<AssetSyncReport>>
    where
        R: ResourceDownloadManager,
    {
        let Some(_gate) = self.asset_gate.try_lock() else {
            debug!("asset sync already running, skipping");
            return Ok(None);
        };

        let manifest = self.read_manifest();
        let old_hash = manifest.default.clone();
        self.state.write().default_hash = old_hash.clone();

        let folder = self.layout.default_assets();
        fs::create_dir_all(&folder)
            .with_context(|| format!("failed to create {}", folder.display()))?;

        let hash = source
            .hash()
            .context("failed to resolve default asset hash")?;
        let reason = decide(
            options.force,
            &hash,
            &self.host_version,
            old_hash.as_deref(),
            manifest.version.as_deref(),
        );

        let mut cleaned = false;
        if let Some(reason) = reason {
            if options.clean {
                observers.info("Cleaning old default resources!");
                reset_folder(&folder)?;
                cleaned = true;
            }
            observers.info(reason.describe("default resources", old_hash.as_deref(), &hash));

            let reduced = self.reduced_info;
            source
                .download_resources(&folder, |event| observers.progress(&event, reduced))
                .context("failed to download default resources")?;
        } else {
            debug!("default resources up to date ({hash})");
        }

        let extras = self.refresh_extras(source)?;

        self.state.write().default_hash = Some(hash.clone());
        self.record(Category::Default, &hash);
        info!("default resources synced ({hash}), {extras} extras");

        Ok(Some(AssetSyncReport {
            hash,
            reason,
            cleaned,
            extras,
            completed_at: Utc::now(),
        }))
    }

    /// Refresh only the extras blobs.
    ///
    /// Shares the asset gate, returning `Ok(None)` while an asset sync runs.
    pub fn reload_extras<R>(&self, source: &R) -> Result<Option<usize>>
    where
        R: ResourceDownloadManager,
    {
        let Some(_gate) = self.asset_gate.try_lock() else {
            debug!("asset sync running, skipping extras reload");
            return Ok(None);
        };
        self.refresh_extras(source).map(Some)
    }

    /// Sync the libraries if stale, then load every artifact present.
    ///
    /// Returns `Ok(None)` when another library sync is in flight.
    pub fn sync_libraries<D, L>(
        &self,
        downloads: &D,
        loader: &L,
        observers: &Observers,
    ) -> Result<Option<LibrarySyncReport>>
    where
        D: LibraryDownloadManager,
        L: LibraryLoader,
    {
        let Some(_gate) = self.library_gate.try_lock() else {
            debug!("library sync already running, skipping");
            return Ok(None);
        };

        let manifest = self.read_manifest();
        let folder = self.layout.libraries();
        fs::create_dir_all(&folder)
            .with_context(|| format!("failed to create {}", folder.display()))?;

        let hash = downloads.hash().context("failed to resolve library hash")?;
        let reason = decide(
            false,
            &hash,
            &self.host_version,
            manifest.libs.as_deref(),
            manifest.version.as_deref(),
        );

        let mut downloaded = Vec::new();
        let mut download_failed = Vec::new();
        if let Some(reason) = reason {
            debug!("libraries stale: {reason:?}");
            downloads
                .download_libraries(&folder, |success, name| {
                    if success {
                        observers.info(format!("Downloaded library \"{name}\""));
                        downloaded.push(name.to_string());
                    } else {
                        observers.error(format!("Unable to download library \"{name}\""));
                        download_failed.push(name.to_string());
                    }
                })
                .context("failed to download libraries")?;
        }

        let mut loaded = Vec::new();
        let mut load_failed = Vec::new();
        loader
            .load_libraries(&folder, |artifact, error| {
                let name = artifact_name(artifact);
                match error {
                    None => {
                        observers.info(format!("Loaded library \"{name}\""));
                        loaded.push(artifact.to_path_buf());
                    }
                    Some(err) => {
                        warn!("failed to load {}: {err:#}", artifact.display());
                        observers.error(format!("Unable to load library \"{name}\""));
                        load_failed.push(artifact.to_path_buf());
                    }
                }
            })
            .context("failed to load libraries")?;

        self.state.write().libs_hash = Some(hash.clone());
        self.record(Category::Libs, &hash);

        Ok(Some(LibrarySyncReport {
            hash,
            reason,
            downloaded,
            download_failed,
            loaded,
            load_failed,
            completed_at: Utc::now(),
        }))
    }

    fn refresh_extras<R>(&self, source: &R) -> Result<usize>
    where
        R: ResourceDownloadManager,
    {
        let extras = &self.extras;
        source
            .download_extras(|| extras.clear(), |key, bytes| extras.insert(key, bytes))
            .context("failed to refresh extras")?;
        Ok(extras.len())
    }

    fn read_manifest(&self) -> Manifest {
        let _guard = self.manifest_lock.lock();
        Manifest::load(self.layout.manifest_path())
    }

    fn record(&self, category: Category, hash: &str) {
        let _guard = self.manifest_lock.lock();
        let path = self.layout.manifest_path();
        let mut manifest = Manifest::load(&path);
        manifest.put(category, hash, self.host_version.as_str());
        if let Err(err) = manifest.persist(&path) {
            warn!("failed to persist manifest {}: {err:#}", path.display());
        }
    }
}

fn reset_folder(folder: &Path) -> Result<()> {
    if folder.exists() {
        fs::remove_dir_all(folder)
            .with_context(|| format!("failed to remove {}", folder.display()))?;
    }
    fs::create_dir_all(folder).with_context(|| format!("failed to create {}", folder.display()))
}

fn artifact_name(artifact: &Path) -> String {
    artifact
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| artifact.display().to_string())
}
