use async_trait::async_trait;
use keygrid::cache::{CacheEntry, CacheValue};
use keygrid::domain::CacheKey;
use keygrid::ports::CacheStore;
use moka::Expiry;
use moka::future::Cache;
use shared::{Result, TtlMs};
use std::fmt::Debug;
use std::time::{Duration, Instant};

/// Moka-based cache store with per-entry TTL
/// Lock-free, concurrent, with optional size bounds; each entry expires on
/// its own TTL so positive and negative results share one cache.
pub struct MokaCacheStore<V>
where
    V: Debug + Send + Sync + Clone + 'static,
{
    cache: Cache<CacheKey, CacheEntry<V>>,
}

/// Expiry policy that reads the TTL carried by each entry.
struct EntryTtl;

impl<V> Expiry<CacheKey, CacheEntry<V>> for EntryTtl
where
    V: Debug + Send + Sync + Clone + 'static,
{
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        entry: &CacheEntry<V>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &CacheKey,
        entry: &CacheEntry<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        // A refresh restarts the clock with the new entry's TTL.
        Some(entry.ttl)
    }
}

impl<V> MokaCacheStore<V>
where
    V: Debug + Send + Sync + Clone + 'static,
{
    /// Create an unbounded store.
    pub fn new_unbounded() -> Self {
        Self {
            cache: Cache::builder().expire_after(EntryTtl).build(),
        }
    }

    /// Create a store bounded to `max_entries`; least-used entries may be
    /// evicted before their TTL.
    pub fn new_bounded(max_entries: u64) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(max_entries)
                .expire_after(EntryTtl)
                .build(),
        }
    }
}

#[async_trait]
impl<V> CacheStore<V> for MokaCacheStore<V>
where
    V: Debug + Send + Sync + Clone + 'static,
{
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry<V>>> {
        match self.cache.get(key).await {
            // Moka evicts lazily; never hand out an entry that is already
            // logically expired.
            Some(entry) if !entry.is_expired() => Ok(Some(entry)),
            _ => Ok(None),
        }
    }

    async fn put(&self, key: CacheKey, value: CacheValue<V>, ttl: TtlMs) -> Result<()> {
        self.cache.insert(key, CacheEntry::new(value, ttl)).await;
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.cache.remove(key).await.is_some())
    }
}

impl<V> Debug for MokaCacheStore<V>
where
    V: Debug + Send + Sync + Clone + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaCacheStore")
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}
