//! Process-wide in-memory storage, the default backend.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::storage::{StorageAdapter, StoredBlob, StoredFile};

pub struct MemoryStorage {
    store: RwLock<HashMap<String, StoredBlob>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            store: RwLock::new(HashMap::new()),
        }
    }

    fn read_store(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, StoredBlob>> {
        match self.store.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Memory store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_store(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, StoredBlob>> {
        match self.store.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Memory store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    async fn save(&self, name: &str, data: &[u8]) -> Result<StoredFile, StorageError> {
        let meta = StoredFile::issue(name, data.len() as u64);
        self.write_store().insert(
            meta.id.clone(),
            StoredBlob {
                meta: meta.clone(),
                data: data.to_vec(),
            },
        );
        Ok(meta)
    }

    async fn load(&self, id: &str) -> Result<Option<StoredBlob>, StorageError> {
        Ok(self.read_store().get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        self.write_store().remove(id);
        Ok(())
    }

    async fn list(&self) -> Result<Option<Vec<StoredFile>>, StorageError> {
        let metas = self.read_store().values().map(|b| b.meta.clone()).collect();
        Ok(Some(metas))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip() {
        let storage = MemoryStorage::new();
        let data = b"not really a pages file";

        let meta = storage.save("doc.pages", data).await.unwrap();
        assert_eq!(meta.name, "doc.pages");
        assert_eq!(meta.size, data.len() as u64);

        let blob = storage.load(&meta.id).await.unwrap().unwrap();
        assert_eq!(blob.data, data);
        assert_eq!(blob.meta, meta);
    }

    #[tokio::test]
    async fn test_load_unknown_id() {
        let storage = MemoryStorage::new();
        assert!(storage.load("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let storage = MemoryStorage::new();
        let meta = storage.save("doc.pages", b"x").await.unwrap();

        storage.delete(&meta.id).await.unwrap();
        storage.delete(&meta.id).await.unwrap();
        storage.delete("never-existed").await.unwrap();

        assert!(storage.load(&meta.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_enumerates_all() {
        let storage = MemoryStorage::new();
        storage.save("a.pages", b"a").await.unwrap();
        storage.save("b.numbers", b"bb").await.unwrap();

        let list = storage.list().await.unwrap().unwrap();
        assert_eq!(list.len(), 2);
    }

    #[tokio::test]
    async fn test_saved_content_is_immutable() {
        let storage = MemoryStorage::new();
        let meta = storage.save("doc.pages", b"v1").await.unwrap();
        // A second save never reuses the identifier
        let meta2 = storage.save("doc.pages", b"v2").await.unwrap();
        assert_ne!(meta.id, meta2.id);
        assert_eq!(storage.load(&meta.id).await.unwrap().unwrap().data, b"v1");
    }

    #[tokio::test]
    async fn test_url_defaults_to_none() {
        let storage = MemoryStorage::new();
        let meta = storage.save("doc.pages", b"x").await.unwrap();
        assert!(storage.url(&meta.id).await.unwrap().is_none());
    }
}
