use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;

use super::{KvStore, StoreError};

/// In-memory stand-in for the Redis store. Used by tests and by dev runs
/// without a `REDIS_URL`; contents vanish with the process.
#[derive(Clone, Default)]
pub struct MemoryStore {
    values: Arc<RwLock<HashMap<String, String>>>,
    hashes: Arc<RwLock<HashMap<String, HashMap<String, String>>>>,
    lists: Arc<RwLock<HashMap<String, VecDeque<String>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl KvStore for MemoryStore {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.read().get(key).cloned())
    }

    async fn put_raw(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.values.write().remove(key);
        self.hashes.write().remove(key);
        self.lists.write().remove(key);
        Ok(())
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        self.hashes
            .write()
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hash_remove(&self, key: &str, field: &str) -> Result<(), StoreError> {
        if let Some(entries) = self.hashes.write().get_mut(key) {
            entries.remove(field);
        }
        Ok(())
    }

    async fn hash_entries(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        Ok(self.hashes.read().get(key).cloned().unwrap_or_default())
    }

    async fn list_push_front(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lists
            .write()
            .entry(key.to_string())
            .or_default()
            .push_front(value.to_string());
        Ok(())
    }

    async fn list_trim(&self, key: &str, start: i64, stop: i64) -> Result<(), StoreError> {
        let mut lists = self.lists.write();
        if let Some(list) = lists.get_mut(key) {
            let len = list.len() as i64;
            let start = normalize_index(start, len).max(0);
            let stop = normalize_index(stop, len).min(len - 1);
            if start > stop {
                list.clear();
            } else {
                let kept: VecDeque<String> = list
                    .iter()
                    .skip(start as usize)
                    .take((stop - start + 1) as usize)
                    .cloned()
                    .collect();
                *list = kept;
            }
        }
        Ok(())
    }

    async fn list_range(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<String>, StoreError> {
        let lists = self.lists.read();
        let Some(list) = lists.get(key) else {
            return Ok(Vec::new());
        };
        let len = list.len() as i64;
        let start = normalize_index(start, len).max(0);
        let stop = normalize_index(stop, len).min(len - 1);
        if start > stop {
            return Ok(Vec::new());
        }
        Ok(list
            .iter()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .cloned()
            .collect())
    }
}

fn normalize_index(index: i64, len: i64) -> i64 {
    if index < 0 {
        len + index
    } else {
        index
    }
}
