use std::sync::Arc;

use tracing::{debug, warn};

use crate::engine::announcement::AnnouncementId;

use super::kv::{KeyValueStore, StoreError};

/// Storage key holding the JSON array of dismissed announcement ids.
pub const DISMISSED_KEY: &str = "dismissed_announcements";

/// Persisted list of announcement ids the user has dismissed.
///
/// Never fails: read problems yield an empty list and write problems are
/// logged. With no backend (a host without persistent storage) every read is
/// empty and writes are dropped.
#[derive(Clone)]
pub struct DismissalStore {
    backend: Option<Arc<dyn KeyValueStore>>,
}

impl DismissalStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// A store for hosts without persistent storage.
    pub fn unavailable() -> Self {
        Self { backend: None }
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    pub fn dismissed_ids(&self) -> Vec<AnnouncementId> {
        let Some(backend) = &self.backend else {
            return Vec::new();
        };
        match read_ids(backend.as_ref()) {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "could not read dismissed announcements");
                Vec::new()
            }
        }
    }

    /// Append `id` and write the whole list back. Duplicates are allowed.
    pub fn add_dismissed_id(&self, id: AnnouncementId) {
        let Some(backend) = &self.backend else {
            debug!(id, "no persistent storage, dismissal kept in memory only");
            return;
        };
        let mut ids = self.dismissed_ids();
        ids.push(id);
        let result = serde_json::to_string(&ids)
            .map_err(StoreError::from)
            .and_then(|json| backend.set(DISMISSED_KEY, &json));
        if let Err(e) = result {
            warn!(id, error = %e, "could not persist dismissed announcement");
        }
    }
}

fn read_ids(backend: &dyn KeyValueStore) -> Result<Vec<AnnouncementId>, StoreError> {
    match backend.get(DISMISSED_KEY)? {
        Some(raw) => Ok(serde_json::from_str(&raw)?),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::kv::{FileStore, MemoryStore};

    /// Backend whose every operation fails.
    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Io(std::io::Error::other("storage disabled")))
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::other("storage disabled")))
        }
    }

    #[test]
    fn test_empty_when_absent() {
        let store = DismissalStore::new(Arc::new(MemoryStore::new()));
        assert!(store.dismissed_ids().is_empty());
    }

    #[test]
    fn test_append_keeps_order_and_duplicates() {
        let backend = Arc::new(MemoryStore::new());
        let store = DismissalStore::new(backend.clone());
        store.add_dismissed_id(3);
        store.add_dismissed_id(1);
        store.add_dismissed_id(3);
        assert_eq!(store.dismissed_ids(), vec![3, 1, 3]);
        assert_eq!(backend.get(DISMISSED_KEY).unwrap().as_deref(), Some("[3,1,3]"));
    }

    #[test]
    fn test_malformed_json_reads_empty() {
        let backend = Arc::new(MemoryStore::new());
        backend.set(DISMISSED_KEY, "{\"oops\": true}").unwrap();
        let store = DismissalStore::new(backend.clone());
        assert!(store.dismissed_ids().is_empty());

        // A dismissal starts a fresh list over the corrupt value.
        store.add_dismissed_id(9);
        assert_eq!(store.dismissed_ids(), vec![9]);
    }

    #[test]
    fn test_broken_backend_never_panics() {
        let store = DismissalStore::new(Arc::new(BrokenStore));
        assert!(store.dismissed_ids().is_empty());
        store.add_dismissed_id(1);
        assert!(store.dismissed_ids().is_empty());
    }

    #[test]
    fn test_unavailable_store() {
        let store = DismissalStore::unavailable();
        assert!(!store.is_available());
        store.add_dismissed_id(1);
        assert!(store.dismissed_ids().is_empty());
    }

    #[test]
    fn test_quota_exceeded_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FileStore::new(dir.path().join("state.json"), Some(48)));
        let store = DismissalStore::new(backend);
        store.add_dismissed_id(1);
        assert_eq!(store.dismissed_ids(), vec![1]);
        for id in 1000..1010 {
            store.add_dismissed_id(id);
        }
        // Writes past the quota are dropped, earlier ones survive.
        let ids = store.dismissed_ids();
        assert_eq!(ids[0], 1);
        assert!(ids.len() < 11);
    }

    #[test]
    fn test_file_backed_ids_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        DismissalStore::new(Arc::new(FileStore::new(&path, None))).add_dismissed_id(42);
        let reloaded = DismissalStore::new(Arc::new(FileStore::new(&path, None)));
        assert_eq!(reloaded.dismissed_ids(), vec![42]);
    }

    #[test]
    fn test_truncated_state_file_recovers_on_dismissal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{trunc").unwrap();
        let store = DismissalStore::new(Arc::new(FileStore::new(&path, None)));

        assert!(store.dismissed_ids().is_empty());
        store.add_dismissed_id(7);
        store.add_dismissed_id(8);
        assert_eq!(store.dismissed_ids(), vec![7, 8]);
    }
}
