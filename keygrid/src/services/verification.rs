use crate::cache::{CacheAside, CacheValue};
use crate::domain::{CacheKey, Credential, Verification};
use crate::ports::OriginStore;
use crate::secret;
use shared::Result;
use std::sync::Arc;

/// Answers "is this credential valid" from the verification cache, falling
/// back to the origin's hash lookup on a miss.
pub struct VerificationService {
    origin: Arc<dyn OriginStore>,
    cache: CacheAside<Credential>,
}

impl VerificationService {
    pub fn new(origin: Arc<dyn OriginStore>, cache: CacheAside<Credential>) -> Self {
        Self { origin, cache }
    }

    /// Verify a presented secret.
    ///
    /// A credential that does not exist and one that is tombstoned produce
    /// the same result, so callers cannot probe for existence of deleted
    /// resources.
    pub async fn verify(&self, secret: &str) -> Result<Verification> {
        let hash = secret::hash_secret(secret);
        let key = CacheKey::verification(&hash);

        let origin = Arc::clone(&self.origin);
        let lookup = hash.clone();
        let value = self
            .cache
            .fetch(key, move || async move { origin.fetch_by_hash(&lookup).await })
            .await?;

        Ok(match value {
            CacheValue::Found(credential) if !credential.is_deleted() => Verification::Valid {
                key_id: credential.id,
                workspace_id: credential.workspace_id,
            },
            _ => Verification::NotFound,
        })
    }
}
