use std::collections::HashMap;

use parking_lot::RwLock;

use super::{Artifact, CacheKey};

/// In-process map of published artifacts. Entries live for the process
/// lifetime.
#[derive(Debug, Default)]
pub struct MemoryLayer {
    entries: RwLock<HashMap<CacheKey, Artifact>>,
}

impl MemoryLayer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<Artifact> {
        self.entries.read().get(key).cloned()
    }

    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Publish an artifact. A key is only ever written once by the
    /// single-flight layer, so an existing entry is kept.
    pub fn insert(&self, key: CacheKey, artifact: Artifact) {
        self.entries.write().entry(key).or_insert(artifact);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
