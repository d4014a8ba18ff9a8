//! Application configuration.

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

/// Directory under the user's config dir holding `config.toml`.
pub const CONFIG_DIR: &str = "packsync";

/// Prefix for environment overrides, e.g. `PACKSYNC_HOST_VERSION`.
pub const ENV_PREFIX: &str = "PACKSYNC";

/// Default decode cache budget (64 MiB of RGBA pixels).
pub const DEFAULT_TEXTURE_CACHE_BYTES: u64 = 64 * 1024 * 1024;

const DEFAULT_CONFIG: &str = r#"# packsync configuration

# Folder holding hashes.json, built-in/Default and libs.
# data_root = "/var/lib/packsync"

# Local mirror with assets/, extras/ and libs/ used as the download source.
# source_root = "/srv/packsync-mirror"

# Only report the terminal "Done" line while downloading assets.
reduced_download_info = false

# Wipe the default asset folder before a resync.
clean_on_resync = false

# Memory budget for decoded textures, in bytes.
texture_cache_bytes = 67108864
"#;

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root folder for the manifest and synced bundles.
    pub data_root: PathBuf,
    /// Local mirror used as the download source.
    #[serde(default)]
    pub source_root: Option<PathBuf>,
    /// Version of the host application; a change forces a resync.
    pub host_version: String,
    /// Suppress per-file progress lines.
    pub reduced_download_info: bool,
    /// Wipe the default asset folder before a resync.
    pub clean_on_resync: bool,
    /// Memory budget for decoded textures.
    pub texture_cache_bytes: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            source_root: None,
            host_version: env!("CARGO_PKG_VERSION").to_string(),
            reduced_download_info: false,
            clean_on_resync: false,
            texture_cache_bytes: DEFAULT_TEXTURE_CACHE_BYTES,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the user config file and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load configuration using `path` as the optional config file.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let defaults = Self::default();

        let settings = Config::builder()
            .set_default("data_root", defaults.data_root.to_string_lossy().to_string())?
            .set_default("host_version", defaults.host_version)?
            .set_default("reduced_download_info", defaults.reduced_download_info)?
            .set_default("clean_on_resync", defaults.clean_on_resync)?
            .set_default("texture_cache_bytes", defaults.texture_cache_bytes)?
            .add_source(File::from(path.clone()).format(FileFormat::Toml).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .with_context(|| format!("failed to load configuration from {}", path.display()))?;

        settings
            .try_deserialize()
            .context("failed to deserialize configuration")
    }
}

/// Default location of the config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
        .join("config.toml")
}

/// Default data root under the user's data directory.
pub fn default_data_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
}

/// Write the commented default config file if none exists yet.
pub fn ensure_default_config() -> Result<PathBuf> {
    let path = config_path();
    if path.exists() {
        return Ok(path);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
