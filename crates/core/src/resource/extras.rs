//! Store for supplementary keyed blobs.

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;

/// Cloneable handle to the extras blobs refreshed on every asset sync.
#[derive(Debug, Clone, Default)]
pub struct ExtrasStore {
    inner: Arc<RwLock<HashMap<String, Arc<[u8]>>>>,
}

impl ExtrasStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every blob.
    pub fn clear(&self) {
        self.inner.write().clear();
    }

    /// Insert or replace a blob.
    pub fn insert(&self, key: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
        self.inner.write().insert(key.into(), bytes.into());
    }

    /// Blob stored under `key`.
    pub fn get(&self, key: &str) -> Option<Arc<[u8]>> {
        self.inner.read().get(key).cloned()
    }

    /// Sorted keys.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.inner.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of blobs.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the store holds no blobs.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
