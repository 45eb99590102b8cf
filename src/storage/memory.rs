//! In-memory [`KvStore`] backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{KvStore, StorageError, StorageResult};

// == Memory KV Store ==
/// Process-local store behind `Arc<RwLock<HashMap>>`.
///
/// Cloning shares the underlying map. [`set_unavailable`](Self::set_unavailable)
/// simulates a backend outage: every call fails until it is switched back.
#[derive(Debug, Clone, Default)]
pub struct MemoryKvStore {
    data: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable("memory store switched off".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.check_available()?;
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        self.check_available()?;
        self.data.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.check_available()?;
        self.data.write().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.check_available()?;
        let data = self.data.read().await;
        let mut keys: Vec<String> = data
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn multi_get(&self, keys: &[String]) -> StorageResult<Vec<Option<Vec<u8>>>> {
        self.check_available()?;
        let data = self.data.read().await;
        Ok(keys.iter().map(|k| data.get(k).cloned()).collect())
    }

    async fn multi_set(&self, entries: Vec<(String, Vec<u8>)>) -> StorageResult<()> {
        self.check_available()?;
        let mut data = self.data.write().await;
        data.extend(entries);
        Ok(())
    }

    async fn multi_delete(&self, keys: &[String]) -> StorageResult<()> {
        self.check_available()?;
        let mut data = self.data.write().await;
        for key in keys {
            data.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryKvStore::new();

        store.set("a", b"1".to_vec()).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(b"1".to_vec()));

        store.delete("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);

        // Deleting a missing key is fine
        store.delete("a").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_keys_by_prefix() {
        let store = MemoryKvStore::new();
        store.set("cache:b", vec![]).await.unwrap();
        store.set("cache:a", vec![]).await.unwrap();
        store.set("ratelimit:x", vec![]).await.unwrap();

        let keys = store.list_keys("cache:").await.unwrap();
        assert_eq!(keys, vec!["cache:a".to_string(), "cache:b".to_string()]);
    }

    #[tokio::test]
    async fn test_multi_operations() {
        let store = MemoryKvStore::new();
        store
            .multi_set(vec![
                ("k1".to_string(), b"v1".to_vec()),
                ("k2".to_string(), b"v2".to_vec()),
            ])
            .await
            .unwrap();

        let values = store
            .multi_get(&["k1".to_string(), "missing".to_string(), "k2".to_string()])
            .await
            .unwrap();
        assert_eq!(values, vec![Some(b"v1".to_vec()), None, Some(b"v2".to_vec())]);

        store.multi_delete(&["k1".to_string()]).await.unwrap();
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_unavailable_switch() {
        let store = MemoryKvStore::new();
        store.set("a", b"1".to_vec()).await.unwrap();

        store.set_unavailable(true);
        assert!(matches!(store.get("a").await, Err(StorageError::Unavailable(_))));
        assert!(store.set("b", vec![]).await.is_err());
        assert!(store.list_keys("").await.is_err());

        store.set_unavailable(false);
        assert_eq!(store.get("a").await.unwrap(), Some(b"1".to_vec()));
    }
}
