use crate::cache::entry::{CacheEntry, CacheValue};
use crate::cache::policy::CachePolicy;
use crate::domain::CacheKey;
use crate::ports::CacheStore;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use shared::Result;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;

type Flight<V> = Shared<BoxFuture<'static, Result<CacheValue<V>>>>;

/// Cache-aside fetch wrapper with per-key single-flight deduplication.
///
/// Reads go to the cache store first; a miss installs one in-flight origin
/// fetch per key, and every concurrent caller for that key awaits the same
/// flight. Successful resolutions (positive or negative) are written back
/// with the policy's TTL; origin errors are shared with all waiters and
/// never cached. A store that errors is treated as a miss, so an unhealthy
/// cache degrades to origin-sourced truth rather than failing reads.
#[derive(Clone)]
pub struct CacheAside<V>
where
    V: Debug + Send + Sync + Clone + 'static,
{
    store: Arc<dyn CacheStore<V>>,
    policy: CachePolicy,
    inflight: Arc<DashMap<CacheKey, Flight<V>>>,
}

impl<V> CacheAside<V>
where
    V: Debug + Send + Sync + Clone + 'static,
{
    pub fn new(store: Arc<dyn CacheStore<V>>, policy: CachePolicy) -> Self {
        Self {
            store,
            policy,
            inflight: Arc::new(DashMap::new()),
        }
    }

    /// Fetch `key`, consulting the origin closure on a miss.
    ///
    /// `Ok(None)` from the origin means confirmed-absent and is cached with
    /// the negative TTL.
    pub async fn fetch<F, Fut>(&self, key: CacheKey, origin: F) -> Result<CacheValue<V>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<V>>> + Send + 'static,
    {
        if let Some(value) = fresh_hit(&key, self.store.get(&key).await) {
            return Ok(value);
        }
        self.join_flight(key, origin).await
    }

    /// Join the in-flight fetch for `key`, installing one if none exists.
    fn join_flight<F, Fut>(&self, key: CacheKey, origin: F) -> Flight<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<V>>> + Send + 'static,
    {
        match self.inflight.entry(key.clone()) {
            Entry::Occupied(flight) => flight.get().clone(),
            Entry::Vacant(slot) => {
                let store = Arc::clone(&self.store);
                let policy = self.policy;
                let inflight = Arc::clone(&self.inflight);
                let flight: Flight<V> = async move {
                    let outcome = resolve(store, policy, key.clone(), origin).await;
                    // The store is already populated at this point, so a
                    // caller arriving after the removal hits the cache.
                    inflight.remove(&key);
                    outcome
                }
                .boxed()
                .shared();
                slot.insert(flight.clone());
                // Detached driver: the flight runs to completion even if
                // every waiter is canceled.
                tokio::spawn(flight.clone().map(|_| ()));
                flight
            }
        }
    }
}

async fn resolve<V, F, Fut>(
    store: Arc<dyn CacheStore<V>>,
    policy: CachePolicy,
    key: CacheKey,
    origin: F,
) -> Result<CacheValue<V>>
where
    V: Debug + Send + Sync + Clone + 'static,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Option<V>>> + Send + 'static,
{
    // A previous flight may have populated the store between this caller's
    // miss and the flight starting.
    if let Some(value) = fresh_hit(&key, store.get(&key).await) {
        return Ok(value);
    }

    let value: CacheValue<V> = origin().await?.into();

    let ttl = policy.ttl_for(&value);
    if let Err(err) = store.put(key.clone(), value.clone(), ttl).await {
        tracing::warn!(key = %key, error = %err, "cache population failed, serving origin result uncached");
    }
    Ok(value)
}

fn fresh_hit<V>(key: &CacheKey, probe: Result<Option<CacheEntry<V>>>) -> Option<CacheValue<V>> {
    match probe {
        Ok(Some(entry)) if !entry.is_expired() => Some(entry.value),
        Ok(_) => None,
        Err(err) => {
            tracing::warn!(key = %key, error = %err, "cache store unavailable, treating as miss");
            None
        }
    }
}
