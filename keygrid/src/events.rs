use crate::domain::CacheKey;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheEvent {
    Invalidated(KeyInvalidatedEvent),
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyInvalidatedEvent {
    pub key: CacheKey,
    pub source: InvalidationSource,
    /// Region that issued the invalidation; only set for remote ones.
    pub origin_region: Option<String>,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationSource {
    Local,
    Remote,
}

impl CacheEvent {
    pub fn invalidated(key: CacheKey, source: InvalidationSource, origin_region: Option<String>) -> Self {
        CacheEvent::Invalidated(KeyInvalidatedEvent {
            key,
            source,
            origin_region,
            timestamp: now_timestamp(),
        })
    }

    pub fn key(&self) -> &CacheKey {
        match self {
            CacheEvent::Invalidated(e) => &e.key,
        }
    }

    pub fn source(&self) -> InvalidationSource {
        match self {
            CacheEvent::Invalidated(e) => e.source,
        }
    }
}

/// Helper to get current timestamp in seconds since UNIX epoch
pub fn now_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
