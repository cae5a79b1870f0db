use keygrid::cache::{CacheAside, CachePolicy, InvalidationCoordinator, PropagationPolicy};
use keygrid::domain::Credential;
use keygrid::events::CacheEvent;
use keygrid::persistence::SledOriginStore;
use keygrid::services::{CredentialService, VerificationService};
use peer_link::TcpPeerBroadcaster;
use shared::config::Config;
use std::sync::Arc;
use storage_engine::MokaCacheStore;
use tokio::sync::broadcast;

const CACHE_MAX_ENTRIES: u64 = 100_000;

/// Server state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub verification: Arc<VerificationService>,
    pub credentials: Arc<CredentialService>,
    pub events: broadcast::Sender<CacheEvent>,
}

impl AppState {
    /// Wire the node: origin store, cache store, cache-aside wrapper,
    /// invalidation coordinator and the consumer services. The coordinator
    /// is returned separately so the peer listener can apply inbound
    /// invalidations through it.
    pub fn new(
        config: &Config,
    ) -> shared::Result<(Self, Arc<InvalidationCoordinator<Credential>>)> {
        let origin_path = std::path::Path::new(&config.data_dir)
            .join("keygrid")
            .join("credentials.sled");
        let origin = Arc::new(SledOriginStore::new(origin_path)?);

        let store = Arc::new(MokaCacheStore::<Credential>::new_bounded(CACHE_MAX_ENTRIES));
        let policy = CachePolicy::new(config.positive_ttl, config.negative_ttl)?;
        let cache = CacheAside::new(store.clone(), policy);

        // Broadcast channel for SSE subscribers (1000 event buffer capacity)
        let (events, _) = broadcast::channel(1000);

        let coordinator = Arc::new(InvalidationCoordinator::new(
            store,
            Arc::new(TcpPeerBroadcaster::default()),
            config.peers.clone(),
            config.region.clone(),
            PropagationPolicy::from_config(&config.propagation),
            events.clone(),
        ));

        let credentials = Arc::new(CredentialService::new(
            origin.clone(),
            cache.clone(),
            Arc::clone(&coordinator),
        ));
        let verification = Arc::new(VerificationService::new(origin, cache));

        Ok((
            Self {
                verification,
                credentials,
                events,
            },
            coordinator,
        ))
    }
}
