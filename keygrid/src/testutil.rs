use crate::cache::{CacheEntry, CacheValue};
use crate::domain::CacheKey;
use crate::ports::CacheStore;
use async_trait::async_trait;
use shared::{Error, Result, TtlMs};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Mutex;

/// Map-backed store for tests. It never evicts on its own, which makes
/// logical expiry observable.
pub struct MemoryStore<V> {
    entries: Mutex<HashMap<CacheKey, CacheEntry<V>>>,
}

impl<V> MemoryStore<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<V> CacheStore<V> for MemoryStore<V>
where
    V: Debug + Send + Sync + Clone + 'static,
{
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry<V>>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn put(&self, key: CacheKey, value: CacheValue<V>, ttl: TtlMs) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key, CacheEntry::new(value, ttl));
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.entries.lock().unwrap().remove(key).is_some())
    }
}

/// Store whose every operation fails, for degraded-mode tests.
pub struct FailingStore;

#[async_trait]
impl<V> CacheStore<V> for FailingStore
where
    V: Debug + Send + Sync + Clone + 'static,
{
    async fn get(&self, _key: &CacheKey) -> Result<Option<CacheEntry<V>>> {
        Err(Error::CacheUnavailable("store offline".into()))
    }

    async fn put(&self, _key: CacheKey, _value: CacheValue<V>, _ttl: TtlMs) -> Result<()> {
        Err(Error::CacheUnavailable("store offline".into()))
    }

    async fn remove(&self, _key: &CacheKey) -> Result<bool> {
        Err(Error::CacheUnavailable("store offline".into()))
    }
}
