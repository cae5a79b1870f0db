use crate::domain::CacheKey;
use crate::events::{CacheEvent, InvalidationSource};
use crate::ports::{CacheStore, PeerBroadcaster};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::Result;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{Instant, sleep};

/// Removal notice for one cache key, fanned out to peer regions after an
/// origin mutation commits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvalidationMessage {
    pub key: CacheKey,
    pub origin_region: String,
    pub issued_at: DateTime<Utc>,
}

/// Retry policy for the peer fan-out. `deadline` is the promised staleness
/// window: once it cannot be met, the peer is left to converge by TTL.
#[derive(Clone, Copy, Debug)]
pub struct PropagationPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub deadline: Duration,
}

impl Default for PropagationPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(250),
            deadline: Duration::from_secs(30),
        }
    }
}

impl PropagationPolicy {
    pub fn from_config(config: &shared::config::PropagationConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            deadline: Duration::from_millis(config.deadline_ms),
        }
    }
}

/// Ties an origin mutation to cache removal on every serving node.
///
/// `invalidate` removes the key from the local store before returning, so a
/// read issued after the call on the same node can never observe the stale
/// positive. The peer fan-out is asynchronous and best-effort: within a
/// node invalidation is linearizable, across regions only the propagation
/// deadline bounds staleness.
pub struct InvalidationCoordinator<V>
where
    V: Debug + Send + Sync + Clone + 'static,
{
    store: Arc<dyn CacheStore<V>>,
    broadcaster: Arc<dyn PeerBroadcaster>,
    peers: Vec<String>,
    region: String,
    policy: PropagationPolicy,
    events: broadcast::Sender<CacheEvent>,
}

impl<V> InvalidationCoordinator<V>
where
    V: Debug + Send + Sync + Clone + 'static,
{
    pub fn new(
        store: Arc<dyn CacheStore<V>>,
        broadcaster: Arc<dyn PeerBroadcaster>,
        peers: Vec<String>,
        region: impl Into<String>,
        policy: PropagationPolicy,
        events: broadcast::Sender<CacheEvent>,
    ) -> Self {
        Self {
            store,
            broadcaster,
            peers,
            region: region.into(),
            policy,
            events,
        }
    }

    /// Remove `key` locally and fan the removal out to all peers.
    ///
    /// Must only be called after the origin mutation is durably committed;
    /// invalidating a not-yet-committed write would let a concurrent read
    /// re-cache the stale positive.
    pub async fn invalidate(&self, key: CacheKey) -> Result<()> {
        if let Err(err) = self.store.remove(&key).await {
            // Reads fall through to origin while the store is down, so
            // correctness on this node is preserved.
            tracing::warn!(key = %key, error = %err, "local cache removal failed");
        }
        self.emit(CacheEvent::invalidated(
            key.clone(),
            InvalidationSource::Local,
            None,
        ));

        if !self.peers.is_empty() {
            let message = InvalidationMessage {
                key,
                origin_region: self.region.clone(),
                issued_at: Utc::now(),
            };
            tokio::spawn(fan_out(
                Arc::clone(&self.broadcaster),
                self.peers.clone(),
                message,
                self.policy,
            ));
        }
        Ok(())
    }

    /// Apply an invalidation received from a peer region. Duplicate and
    /// out-of-order deliveries land on an already-removed key and are no-ops.
    pub async fn apply_remote(&self, message: InvalidationMessage) -> Result<()> {
        if let Err(err) = self.store.remove(&message.key).await {
            tracing::warn!(
                key = %message.key,
                origin_region = %message.origin_region,
                error = %err,
                "remote invalidation could not remove entry"
            );
        }
        self.emit(CacheEvent::invalidated(
            message.key,
            InvalidationSource::Remote,
            Some(message.origin_region),
        ));
        Ok(())
    }

    fn emit(&self, event: CacheEvent) {
        match self.events.send(event) {
            Ok(subscribers) => {
                tracing::debug!(subscribers, "cache event broadcast");
            }
            Err(_) => {
                // Nobody subscribed; the event stream is observability only.
            }
        }
    }
}

async fn fan_out(
    broadcaster: Arc<dyn PeerBroadcaster>,
    peers: Vec<String>,
    message: InvalidationMessage,
    policy: PropagationPolicy,
) {
    let deliveries = peers.into_iter().map(|peer| {
        let broadcaster = Arc::clone(&broadcaster);
        let message = message.clone();
        async move { propagate_to_peer(broadcaster, &peer, &message, policy).await }
    });
    futures::future::join_all(deliveries).await;
}

async fn propagate_to_peer(
    broadcaster: Arc<dyn PeerBroadcaster>,
    peer: &str,
    message: &InvalidationMessage,
    policy: PropagationPolicy,
) {
    let deadline = Instant::now() + policy.deadline;
    let mut backoff = policy.initial_backoff;

    for attempt in 1..=policy.max_attempts {
        match broadcaster.send(peer, message).await {
            Ok(()) => {
                tracing::debug!(peer, key = %message.key, attempt, "invalidation delivered");
                return;
            }
            Err(err) => {
                let exhausted =
                    attempt == policy.max_attempts || Instant::now() + backoff >= deadline;
                if exhausted {
                    tracing::error!(
                        peer,
                        key = %message.key,
                        attempt,
                        error = %err,
                        "invalidation propagation failed, peer converges by TTL"
                    );
                    return;
                }
                tracing::warn!(peer, key = %message.key, attempt, error = %err, "invalidation send failed, retrying");
                sleep(backoff).await;
                backoff = backoff.saturating_mul(2);
            }
        }
    }
}

/// Broadcaster for single-region deployments and tests.
pub struct NoopBroadcaster;

#[async_trait]
impl PeerBroadcaster for NoopBroadcaster {
    async fn send(&self, _peer: &str, _message: &InvalidationMessage) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::CacheValue;
    use crate::testutil::MemoryStore;
    use shared::{Error, TtlMs};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct RecordingBroadcaster {
        attempts: AtomicU32,
        fail_first: u32,
    }

    impl RecordingBroadcaster {
        fn failing_first(fail_first: u32) -> Arc<Self> {
            Arc::new(Self {
                attempts: AtomicU32::new(0),
                fail_first,
            })
        }

        fn attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PeerBroadcaster for RecordingBroadcaster {
        async fn send(&self, _peer: &str, _message: &InvalidationMessage) -> Result<()> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= self.fail_first {
                Err(Error::Propagation("peer unreachable".into()))
            } else {
                Ok(())
            }
        }
    }

    fn coordinator(
        store: Arc<MemoryStore<String>>,
        broadcaster: Arc<dyn PeerBroadcaster>,
        peers: Vec<String>,
    ) -> InvalidationCoordinator<String> {
        let (events, _) = broadcast::channel(16);
        let policy = PropagationPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(10),
            deadline: Duration::from_secs(5),
        };
        InvalidationCoordinator::new(store, broadcaster, peers, "region-a", policy, events)
    }

    async fn seed(store: &MemoryStore<String>, key: &CacheKey) {
        store
            .put(key.clone(), CacheValue::Found("v1".into()), TtlMs(60_000))
            .await
            .unwrap();
    }

    async fn wait_for_attempts(broadcaster: &RecordingBroadcaster, expected: u32) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while broadcaster.attempts() < expected {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("fan-out did not reach expected attempts in time");
    }

    #[tokio::test]
    async fn invalidate_removes_local_entry_before_returning() {
        let store = Arc::new(MemoryStore::new());
        let key = CacheKey::credential("cred_1");
        seed(&store, &key).await;

        let coordinator = coordinator(store.clone(), Arc::new(NoopBroadcaster), vec![]);
        coordinator.invalidate(key.clone()).await.unwrap();

        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalidate_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let key = CacheKey::credential("cred_1");
        seed(&store, &key).await;

        let coordinator = coordinator(store.clone(), Arc::new(NoopBroadcaster), vec![]);
        coordinator.invalidate(key.clone()).await.unwrap();
        coordinator.invalidate(key.clone()).await.unwrap();

        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remote_invalidation_removes_entry_set_before_it_arrived() {
        let store = Arc::new(MemoryStore::new());
        let key = CacheKey::credential("cred_1");
        seed(&store, &key).await;

        let coordinator = coordinator(store.clone(), Arc::new(NoopBroadcaster), vec![]);
        let message = InvalidationMessage {
            key: key.clone(),
            origin_region: "region-b".into(),
            issued_at: Utc::now(),
        };
        coordinator.apply_remote(message.clone()).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_none());

        // At-least-once delivery: a duplicate is a no-op.
        coordinator.apply_remote(message).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn emits_local_and_remote_events() {
        let store = Arc::new(MemoryStore::new());
        let coordinator = coordinator(store, Arc::new(NoopBroadcaster), vec![]);
        let mut events = coordinator.events.subscribe();

        let key = CacheKey::credential("cred_1");
        coordinator.invalidate(key.clone()).await.unwrap();
        let event = events.recv().await.unwrap();
        assert_eq!(event.source(), InvalidationSource::Local);
        assert_eq!(event.key(), &key);

        coordinator
            .apply_remote(InvalidationMessage {
                key: key.clone(),
                origin_region: "region-b".into(),
                issued_at: Utc::now(),
            })
            .await
            .unwrap();
        let event = events.recv().await.unwrap();
        assert_eq!(event.source(), InvalidationSource::Remote);
    }

    #[tokio::test]
    async fn fan_out_retries_until_delivery() {
        let store = Arc::new(MemoryStore::new());
        let broadcaster = RecordingBroadcaster::failing_first(2);
        let coordinator = coordinator(
            store,
            broadcaster.clone(),
            vec!["peer-a:5500".to_string()],
        );

        coordinator
            .invalidate(CacheKey::credential("cred_1"))
            .await
            .unwrap();

        wait_for_attempts(&broadcaster, 3).await;
        assert_eq!(broadcaster.attempts(), 3);
    }

    #[tokio::test]
    async fn fan_out_gives_up_after_max_attempts() {
        let store = Arc::new(MemoryStore::new());
        let broadcaster = RecordingBroadcaster::failing_first(u32::MAX);
        let coordinator = coordinator(
            store,
            broadcaster.clone(),
            vec!["peer-a:5500".to_string()],
        );

        coordinator
            .invalidate(CacheKey::credential("cred_1"))
            .await
            .unwrap();

        wait_for_attempts(&broadcaster, 3).await;
        sleep(Duration::from_millis(50)).await;
        assert_eq!(broadcaster.attempts(), 3);
    }
}
