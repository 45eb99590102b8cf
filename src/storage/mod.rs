//! Storage Module
//!
//! The persisted key-value interface every component is written against,
//! plus an in-process implementation.

mod key;
mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use key::{storage_key, MAX_STORAGE_KEY_LENGTH};
pub use memory::MemoryKvStore;

// == Storage Error ==
/// Failures raised by a [`KvStore`] backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    /// Backend unreachable
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Record could not be encoded or decoded
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

// == KvStore Trait ==
/// Persisted byte-oriented key-value storage.
///
/// Writes are whole-record overwrites; last write wins.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    async fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Returns one slot per requested key, in request order.
    async fn multi_get(&self, keys: &[String]) -> StorageResult<Vec<Option<Vec<u8>>>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.get(key).await?);
        }
        Ok(values)
    }

    /// Not transactional: a failure part way through leaves earlier writes applied.
    async fn multi_set(&self, entries: Vec<(String, Vec<u8>)>) -> StorageResult<()> {
        for (key, value) in entries {
            self.set(&key, value).await?;
        }
        Ok(())
    }

    async fn multi_delete(&self, keys: &[String]) -> StorageResult<()> {
        for key in keys {
            self.delete(key).await?;
        }
        Ok(())
    }
}
