//! Hash manifest stored alongside the synced bundles.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// File name of the manifest inside the data root.
pub const MANIFEST_FILE: &str = "hashes.json";

/// Placeholder used in status lines when a manifest value was never recorded.
pub const EMPTY_MARKER: &str = "EMPTY";

/// Bundle categories tracked by the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// The default asset bundle.
    Default,
    /// The native support library bundle.
    Libs,
}

impl Category {
    /// Key under which the category hash is stored.
    pub fn key(self) -> &'static str {
        match self {
            Category::Default => "Default",
            Category::Libs => "libs",
        }
    }
}

/// Last-synced hashes and the host version that performed the sync.
///
/// Keys other than `Default`, `libs` and `version` are kept in `other` and
/// written back untouched. Recognised keys holding a non-string value are read
/// as their JSON text rather than rejecting the whole record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Hash of the default asset bundle.
    #[serde(
        rename = "Default",
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub default: Option<String>,
    /// Hash of the library bundle.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub libs: Option<String>,
    /// Host application version at the last successful sync.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<String>,
    /// Unrecognised keys.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Manifest {
    /// Load the manifest at `path`.
    ///
    /// A missing file yields an empty record. An unreadable or unparsable file
    /// is logged and also yields an empty record, which forces a full resync.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::read(path) {
            Ok(Some(manifest)) => manifest,
            Ok(None) => {
                debug!("no manifest at {}, starting empty", path.display());
                Self::default()
            }
            Err(err) => {
                warn!("invalid manifest {}, it will be reset: {err:#}", path.display());
                Self::default()
            }
        }
    }

    fn read(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        let manifest = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse manifest {}", path.display()))?;
        Ok(Some(manifest))
    }

    /// Recorded hash for `category` together with the recorded host version.
    pub fn get(&self, category: Category) -> Option<(&str, Option<&str>)> {
        let hash = match category {
            Category::Default => self.default.as_deref(),
            Category::Libs => self.libs.as_deref(),
        }?;
        Some((hash, self.version.as_deref()))
    }

    /// Record `hash` for `category` under host `version`.
    ///
    /// The version field is shared by every category. When `version` differs
    /// from the recorded one, the hashes of the other categories are dropped:
    /// they were synced by the previous host version and must resync too.
    pub fn put(&mut self, category: Category, hash: impl Into<String>, version: impl Into<String>) {
        let version = version.into();
        if self.version.as_deref() != Some(version.as_str()) {
            self.default = None;
            self.libs = None;
        }

        let hash = Some(hash.into());
        match category {
            Category::Default => self.default = hash,
            Category::Libs => self.libs = hash,
        }
        self.version = Some(version);
    }

    /// Write the manifest as pretty JSON.
    ///
    /// The content goes to a temporary file in the same directory which is then
    /// renamed over `path`, so readers never observe a partial file.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).with_context(|| {
            format!("failed to create manifest directory {}", parent.display())
        })?;

        let mut serialized =
            serde_json::to_string_pretty(self).context("failed to serialize manifest")?;
        serialized.push('\n');

        let mut staged = NamedTempFile::new_in(&parent)
            .with_context(|| format!("failed to stage manifest in {}", parent.display()))?;
        staged
            .write_all(serialized.as_bytes())
            .context("failed to write staged manifest")?;
        staged
            .as_file()
            .sync_all()
            .context("failed to flush staged manifest")?;
        staged
            .persist(path)
            .with_context(|| format!("failed to replace manifest {}", path.display()))?;
        Ok(())
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(value)) => Some(value),
        Some(other) => Some(other.to_string()),
    })
}

/// Helper to compute the manifest path inside a data root.
pub fn manifest_path(root: impl AsRef<Path>) -> PathBuf {
    root.as_ref().join(MANIFEST_FILE)
}
