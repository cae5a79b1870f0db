use shared::TtlMs;
use std::time::{Duration, Instant};

/// What the cache knows about a key. `Absent` is a confirmed negative
/// result from the origin, distinct from having no entry at all.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue<V> {
    Found(V),
    Absent,
}

impl<V> CacheValue<V> {
    pub fn is_absent(&self) -> bool {
        matches!(self, CacheValue::Absent)
    }

    pub fn as_found(&self) -> Option<&V> {
        match self {
            CacheValue::Found(v) => Some(v),
            CacheValue::Absent => None,
        }
    }

    pub fn into_found(self) -> Option<V> {
        match self {
            CacheValue::Found(v) => Some(v),
            CacheValue::Absent => None,
        }
    }
}

impl<V> From<Option<V>> for CacheValue<V> {
    fn from(opt: Option<V>) -> Self {
        match opt {
            Some(v) => CacheValue::Found(v),
            None => CacheValue::Absent,
        }
    }
}

/// A cache entry with its own lifetime. An entry past `inserted_at + ttl`
/// is logically expired and must never be served without revalidation,
/// even by a backend that has not physically evicted it yet.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: CacheValue<V>,
    pub inserted_at: Instant,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    pub fn new(value: CacheValue<V>, ttl: TtlMs) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
            ttl: ttl.as_duration(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() >= self.ttl
    }
}
