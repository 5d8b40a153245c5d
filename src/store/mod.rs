pub mod keys;
pub mod memory;
pub mod redis;

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Redis(#[from] ::redis::RedisError),
    #[error("serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Minimal persistence surface the engine needs: string values, hash
/// fields and newest-first capped lists. Implementations must not retry;
/// failures propagate to the caller unchanged.
#[async_trait::async_trait]
pub trait KvStore: Send + Sync {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn put_raw(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError>;
    async fn hash_remove(&self, key: &str, field: &str) -> Result<(), StoreError>;
    async fn hash_entries(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    async fn list_push_front(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn list_trim(&self, key: &str, start: i64, stop: i64) -> Result<(), StoreError>;
    async fn list_range(&self, key: &str, start: i64, stop: i64)
        -> Result<Vec<String>, StoreError>;
}

pub async fn get_json<T>(store: &dyn KvStore, key: &str) -> Result<Option<T>, StoreError>
where
    T: DeserializeOwned,
{
    let Some(payload) = store.get_raw(key).await? else {
        return Ok(None);
    };
    Ok(Some(serde_json::from_str(&payload)?))
}

pub async fn put_json<T>(store: &dyn KvStore, key: &str, value: &T) -> Result<(), StoreError>
where
    T: Serialize,
{
    let payload = serde_json::to_string(value)?;
    store.put_raw(key, &payload).await
}
