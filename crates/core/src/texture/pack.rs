use std::{borrow::Cow, fs, io, path::PathBuf, sync::Arc};

/// Handle to a file inside a resource pack.
#[derive(Debug, Clone)]
pub enum PackFile {
    /// A file on disk.
    Disk(PathBuf),
    /// A file already held in memory, e.g. read from an archive.
    Memory {
        /// Entry name.
        name: String,
        /// File contents.
        bytes: Arc<[u8]>,
    },
}

impl PackFile {
    /// File on disk at `path`.
    pub fn disk(path: impl Into<PathBuf>) -> Self {
        PackFile::Disk(path.into())
    }

    /// In-memory file.
    pub fn memory(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        PackFile::Memory {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Display name of the file.
    pub fn name(&self) -> String {
        match self {
            PackFile::Disk(path) => path.display().to_string(),
            PackFile::Memory { name, .. } => name.clone(),
        }
    }

    /// Contents of the file.
    pub fn read(&self) -> io::Result<Cow<'_, [u8]>> {
        match self {
            PackFile::Disk(path) => fs::read(path).map(Cow::Owned),
            PackFile::Memory { bytes, .. } => Ok(Cow::Borrowed(&bytes[..])),
        }
    }
}
