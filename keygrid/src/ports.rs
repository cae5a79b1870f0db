#![deny(clippy::all)]

use crate::cache::{CacheEntry, CacheValue};
use crate::cache::invalidation::InvalidationMessage;
use crate::domain::{CacheKey, Credential};
use async_trait::async_trait;
use shared::{Result, TtlMs};
use std::fmt::Debug;

// Ports are the pluggable extension points for the cache backend, the
// durable store and the invalidation transport.

/// Port for the per-node cache backend.
///
/// `get` returns `Ok(None)` for a miss; `Err` means the store itself is
/// unavailable, which callers must treat as a miss and route to origin.
/// `remove` is idempotent. Entries may be evicted early under memory
/// pressure; only TTL honoring is guaranteed.
#[async_trait]
pub trait CacheStore<V>: Send + Sync + 'static
where
    V: Debug + Send + Sync + Clone + 'static,
{
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry<V>>>;
    async fn put(&self, key: CacheKey, value: CacheValue<V>, ttl: TtlMs) -> Result<()>;
    async fn remove(&self, key: &CacheKey) -> Result<bool>;
}

/// Port for the durable store that owns credentials. Any relational,
/// document or key-value backend satisfies this; the shipped implementation
/// is sled. The cache core never touches this trait directly — consumer
/// flows hand the fetcher a closure over one of its methods.
#[async_trait]
pub trait OriginStore: Send + Sync + 'static {
    async fn fetch_by_id(&self, id: &str) -> Result<Option<Credential>>;
    async fn fetch_by_hash(&self, hash: &str) -> Result<Option<Credential>>;
    async fn insert(&self, credential: Credential) -> Result<()>;
    /// Writes the tombstone. Fails with `NotFound` for a missing or
    /// already-deleted credential; the transition is one-way.
    async fn mark_deleted(&self, id: &str) -> Result<()>;
}

/// Port for delivering one invalidation message to one peer node. Retry,
/// backoff and the propagation deadline live in the coordinator, not here.
#[async_trait]
pub trait PeerBroadcaster: Send + Sync + 'static {
    async fn send(&self, peer: &str, message: &InvalidationMessage) -> Result<()>;
}
