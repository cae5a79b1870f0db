use crate::cache::entry::CacheValue;
use shared::{Error, Result, TtlMs};

pub const DEFAULT_POSITIVE_TTL_MS: u64 = 60_000;
pub const DEFAULT_NEGATIVE_TTL_MS: u64 = 10_000;

/// TTL selection for cache population. Positive results live longer;
/// `Absent` entries use the short negative TTL so a not-yet-visible
/// credential stays hidden for a bounded window only.
#[derive(Clone, Copy, Debug)]
pub struct CachePolicy {
    pub positive_ttl: TtlMs,
    pub negative_ttl: TtlMs,
}

impl CachePolicy {
    pub fn new(positive_ttl: TtlMs, negative_ttl: TtlMs) -> Result<Self> {
        if positive_ttl.0 == 0 || negative_ttl.0 == 0 {
            return Err(Error::Validation("cache TTLs must be non-zero".into()));
        }
        if negative_ttl.0 > positive_ttl.0 {
            return Err(Error::Validation(
                "negative TTL must not exceed positive TTL".into(),
            ));
        }
        Ok(Self {
            positive_ttl,
            negative_ttl,
        })
    }

    pub fn ttl_for<V>(&self, value: &CacheValue<V>) -> TtlMs {
        if value.is_absent() {
            self.negative_ttl
        } else {
            self.positive_ttl
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            positive_ttl: TtlMs(DEFAULT_POSITIVE_TTL_MS),
            negative_ttl: TtlMs(DEFAULT_NEGATIVE_TTL_MS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_ttl_by_polarity() {
        let policy = CachePolicy::new(TtlMs(60_000), TtlMs(5_000)).unwrap();
        assert_eq!(policy.ttl_for(&CacheValue::Found(1u32)), TtlMs(60_000));
        assert_eq!(policy.ttl_for::<u32>(&CacheValue::Absent), TtlMs(5_000));
    }

    #[test]
    fn rejects_zero_ttls() {
        assert!(CachePolicy::new(TtlMs(0), TtlMs(1)).is_err());
        assert!(CachePolicy::new(TtlMs(1), TtlMs(0)).is_err());
    }

    #[test]
    fn rejects_negative_ttl_longer_than_positive() {
        assert!(CachePolicy::new(TtlMs(1_000), TtlMs(2_000)).is_err());
    }
}
