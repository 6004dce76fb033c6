use crate::models::FileList;
use dashmap::DashMap;

const DEFAULT_CAPACITY: usize = 1024;

/// Invalidates rendered views cached under a path.
pub trait Revalidate: Send + Sync {
    fn revalidate(&self, path: &str);
}

/// File listings keyed by `(path, account_id)`.
///
/// The path comes from the client, so the map is capped: inserting a new key
/// into a full cache flushes it first.
pub struct ViewCache {
    entries: DashMap<(String, String), FileList>,
    capacity: usize,
}

impl Default for ViewCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl ViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: DashMap::new(), capacity: capacity.max(1) }
    }

    pub fn get(&self, path: &str, account_id: &str) -> Option<FileList> {
        self.entries
            .get(&(path.to_string(), account_id.to_string()))
            .map(|e| e.value().clone())
    }

    pub fn put(&self, path: &str, account_id: &str, list: FileList) {
        let key = (path.to_string(), account_id.to_string());
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            log::debug!("view cache full ({} entries), flushing", self.entries.len());
            self.entries.clear();
        }
        self.entries.insert(key, list);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Revalidate for ViewCache {
    fn revalidate(&self, path: &str) {
        self.entries.retain(|(p, _), _| p != path);
        log::debug!("revalidated {path}");
    }
}
