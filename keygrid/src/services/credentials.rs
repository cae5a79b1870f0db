use crate::cache::{CacheAside, InvalidationCoordinator};
use crate::domain::{CacheKey, Credential};
use crate::ports::OriginStore;
use crate::secret;
use shared::{Error, Result};
use std::sync::Arc;

/// The plaintext secret is part of the creation response and is never
/// reproducible afterwards.
pub struct CreatedCredential {
    pub key_id: String,
    pub secret: String,
}

/// Credential lifecycle: create, read, delete. Reads go through the
/// cache-aside wrapper; the deletion path commits the tombstone at the
/// origin before any cache removal.
pub struct CredentialService {
    origin: Arc<dyn OriginStore>,
    cache: CacheAside<Credential>,
    invalidation: Arc<InvalidationCoordinator<Credential>>,
}

impl CredentialService {
    pub fn new(
        origin: Arc<dyn OriginStore>,
        cache: CacheAside<Credential>,
        invalidation: Arc<InvalidationCoordinator<Credential>>,
    ) -> Self {
        Self {
            origin,
            cache,
            invalidation,
        }
    }

    /// Mint a credential for `workspace_id`.
    ///
    /// There is no invalidation path for creation: a peer that cached
    /// this credential as absent converges within the negative TTL.
    pub async fn create(
        &self,
        workspace_id: &str,
        name: Option<String>,
    ) -> Result<CreatedCredential> {
        let generated = secret::generate_secret();
        let credential = Credential::new(workspace_id, name, generated.hash);

        self.origin.insert(credential.clone()).await?;

        Ok(CreatedCredential {
            key_id: credential.id,
            secret: generated.secret,
        })
    }

    pub async fn get(&self, authorized_workspace: &str, id: &str) -> Result<Credential> {
        self.fetch_visible(authorized_workspace, id).await
    }

    /// Delete a credential: tombstone at the origin, then invalidate both
    /// cache namespaces. After this returns, a read on this node cannot
    /// observe the credential as valid; peers converge within the
    /// propagation deadline.
    pub async fn delete(&self, authorized_workspace: &str, id: &str) -> Result<()> {
        let credential = self.fetch_visible(authorized_workspace, id).await?;

        // The tombstone must be durably committed before cache removal, or
        // a concurrent read could re-cache the stale positive.
        self.origin.mark_deleted(&credential.id).await?;

        self.invalidation
            .invalidate(CacheKey::credential(&credential.id))
            .await?;
        self.invalidation
            .invalidate(CacheKey::verification(&credential.hash))
            .await?;

        Ok(())
    }

    /// Cached fetch with the visibility rules applied: not-found,
    /// tombstoned and foreign-workspace credentials are all `NotFound`.
    async fn fetch_visible(&self, authorized_workspace: &str, id: &str) -> Result<Credential> {
        let key = CacheKey::credential(id);
        let origin = Arc::clone(&self.origin);
        let lookup = id.to_string();

        let value = self
            .cache
            .fetch(key, move || async move { origin.fetch_by_id(&lookup).await })
            .await?;

        let Some(credential) = value.into_found() else {
            return Err(Error::NotFound);
        };
        if credential.is_deleted() || !credential.owned_by(authorized_workspace) {
            return Err(Error::NotFound);
        }
        Ok(credential)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::{CachePolicy, NoopBroadcaster, PropagationPolicy};
    use crate::domain::Verification;
    use crate::persistence::SledOriginStore;
    use crate::services::VerificationService;
    use crate::testutil::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::broadcast;

    pub(crate) fn noop_coordinator(
        store: Arc<MemoryStore<Credential>>,
    ) -> Arc<InvalidationCoordinator<Credential>> {
        let (events, _) = broadcast::channel(16);
        Arc::new(InvalidationCoordinator::new(
            store,
            Arc::new(NoopBroadcaster),
            vec![],
            "test-region",
            PropagationPolicy::default(),
            events,
        ))
    }

    pub(crate) fn services() -> (tempfile::TempDir, CredentialService, VerificationService) {
        let dir = tempfile::tempdir().unwrap();
        let origin: Arc<dyn OriginStore> =
            Arc::new(SledOriginStore::new(dir.path().join("origin.sled")).unwrap());
        let store = Arc::new(MemoryStore::new());
        let cache = CacheAside::new(store.clone(), CachePolicy::default());

        let credentials = CredentialService::new(
            Arc::clone(&origin),
            cache.clone(),
            noop_coordinator(store),
        );
        let verification = VerificationService::new(origin, cache);
        (dir, credentials, verification)
    }

    /// Origin wrapper counting lookups, to observe cache effectiveness.
    pub(crate) struct CountingOrigin {
        inner: Arc<SledOriginStore>,
        id_lookups: AtomicUsize,
        hash_lookups: AtomicUsize,
    }

    impl CountingOrigin {
        pub(crate) fn new(inner: Arc<SledOriginStore>) -> Self {
            Self {
                inner,
                id_lookups: AtomicUsize::new(0),
                hash_lookups: AtomicUsize::new(0),
            }
        }

        pub(crate) fn id_lookups(&self) -> usize {
            self.id_lookups.load(Ordering::SeqCst)
        }

        pub(crate) fn hash_lookups(&self) -> usize {
            self.hash_lookups.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OriginStore for CountingOrigin {
        async fn fetch_by_id(&self, id: &str) -> Result<Option<Credential>> {
            self.id_lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch_by_id(id).await
        }

        async fn fetch_by_hash(&self, hash: &str) -> Result<Option<Credential>> {
            self.hash_lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch_by_hash(hash).await
        }

        async fn insert(&self, credential: Credential) -> Result<()> {
            self.inner.insert(credential).await
        }

        async fn mark_deleted(&self, id: &str) -> Result<()> {
            self.inner.mark_deleted(id).await
        }
    }

    #[tokio::test]
    async fn create_returns_plaintext_secret_once() {
        let (_dir, credentials, _verification) = services();
        let created = credentials.create("ws_1", Some("deploy".into())).await.unwrap();

        assert!(created.secret.starts_with("kg_"));
        let fetched = credentials.get("ws_1", &created.key_id).await.unwrap();
        // Only the digest is stored.
        assert_ne!(fetched.hash, created.secret);
        assert_eq!(fetched.hash, crate::secret::hash_secret(&created.secret));
    }

    #[tokio::test]
    async fn delete_then_verify_on_same_node_is_not_found() {
        let (_dir, credentials, verification) = services();
        let created = credentials.create("ws_1", None).await.unwrap();

        // Populate both cache namespaces with the positive result.
        assert!(verification.verify(&created.secret).await.unwrap().is_valid());
        credentials.get("ws_1", &created.key_id).await.unwrap();

        credentials.delete("ws_1", &created.key_id).await.unwrap();

        // Local read-after-write: no staleness window on this node.
        assert_eq!(
            verification.verify(&created.secret).await.unwrap(),
            Verification::NotFound
        );
        assert!(matches!(
            credentials.get("ws_1", &created.key_id).await.unwrap_err(),
            Error::NotFound
        ));
    }

    #[tokio::test]
    async fn foreign_workspace_reads_collapse_to_not_found() {
        let (_dir, credentials, _verification) = services();
        let created = credentials.create("ws_1", None).await.unwrap();

        let err = credentials.get("ws_2", &created.key_id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound));
    }

    #[tokio::test]
    async fn foreign_workspace_delete_is_rejected_as_not_found() {
        let (_dir, credentials, verification) = services();
        let created = credentials.create("ws_1", None).await.unwrap();

        let err = credentials.delete("ws_2", &created.key_id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound));

        // The credential is untouched.
        assert!(verification.verify(&created.secret).await.unwrap().is_valid());
    }

    #[tokio::test]
    async fn double_delete_is_not_found() {
        let (_dir, credentials, _verification) = services();
        let created = credentials.create("ws_1", None).await.unwrap();

        credentials.delete("ws_1", &created.key_id).await.unwrap();
        let err = credentials.delete("ws_1", &created.key_id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound));
    }

    #[tokio::test]
    async fn repeated_gets_hit_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let sled = Arc::new(SledOriginStore::new(dir.path().join("origin.sled")).unwrap());
        let counting = Arc::new(CountingOrigin::new(sled));
        let store = Arc::new(MemoryStore::new());
        let cache = CacheAside::new(store.clone(), CachePolicy::default());
        let credentials =
            CredentialService::new(counting.clone(), cache, noop_coordinator(store));

        let created = credentials.create("ws_1", None).await.unwrap();
        credentials.get("ws_1", &created.key_id).await.unwrap();
        credentials.get("ws_1", &created.key_id).await.unwrap();

        assert_eq!(counting.id_lookups(), 1);
    }
}
