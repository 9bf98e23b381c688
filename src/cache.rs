use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

use crate::{listing::CacheWriter, record::FileRecord};

/// What is known about one path
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub attr: Option<FileRecord>,
    pub link: Option<Vec<u8>>,
}

/// In-memory attribute cache keyed by absolute path bytes.
///
/// No eviction: entries live until [`MemoryCache::clear`].
#[derive(Debug)]
pub struct MemoryCache {
    enabled: bool,
    entries: RwLock<HashMap<Vec<u8>, CacheEntry>>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            enabled: true,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// A cache that accepts nothing
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new()
        }
    }

    fn update<F>(&self, path: &[u8], f: F)
    where
        F: FnOnce(&mut CacheEntry),
    {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        f(entries.entry(path.to_vec()).or_default());
    }

    #[must_use]
    pub fn get<P: AsRef<[u8]>>(&self, path: P) -> Option<CacheEntry> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(path.as_ref()).cloned()
    }

    #[must_use]
    pub fn attr<P: AsRef<[u8]>>(&self, path: P) -> Option<FileRecord> {
        self.get(path).and_then(|entry| entry.attr)
    }

    #[must_use]
    pub fn link<P: AsRef<[u8]>>(&self, path: P) -> Option<Vec<u8>> {
        self.get(path).and_then(|entry| entry.link)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl CacheWriter for MemoryCache {
    fn add_attr(&self, path: &[u8], record: &FileRecord) {
        self.update(path, |entry| entry.attr = Some(*record));
    }

    fn add_link(&self, path: &[u8], target: &[u8]) {
        self.update(path, |entry| entry.link = Some(target.to_vec()));
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
