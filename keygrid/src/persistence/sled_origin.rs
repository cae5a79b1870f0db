use crate::domain::Credential;
use crate::ports::OriginStore;
use async_trait::async_trait;
use chrono::Utc;
use shared::{Error, Result};
use std::path::Path;

const CREDENTIALS_TREE: &str = "credentials";
const CREDENTIALS_BY_HASH_TREE: &str = "credentials_by_hash";

/// Sled-backed durable store for credentials.
///
/// Primary tree maps id to the JSON credential; a secondary tree maps the
/// secret hash to the id for the verification lookup path.
#[derive(Clone)]
pub struct SledOriginStore {
    db: sled::Db,
}

impl SledOriginStore {
    /// Open (or create) the store at `path`, creating parent directories.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Origin(format!("failed to create directory: {e}")))?;
        }

        let db = sled::open(path)
            .map_err(|e| Error::Origin(format!("failed to open sled database: {e}")))?;

        Ok(Self { db })
    }

    fn credentials_tree(&self) -> Result<sled::Tree> {
        self.db
            .open_tree(CREDENTIALS_TREE)
            .map_err(|e| Error::Origin(e.to_string()))
    }

    fn hash_index_tree(&self) -> Result<sled::Tree> {
        self.db
            .open_tree(CREDENTIALS_BY_HASH_TREE)
            .map_err(|e| Error::Origin(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<Credential> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::Origin(format!("failed to deserialize credential: {e}")))
    }
}

#[async_trait]
impl OriginStore for SledOriginStore {
    async fn fetch_by_id(&self, id: &str) -> Result<Option<Credential>> {
        let credentials = self.credentials_tree()?;

        match credentials
            .get(id.as_bytes())
            .map_err(|e| Error::Origin(e.to_string()))?
        {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn fetch_by_hash(&self, hash: &str) -> Result<Option<Credential>> {
        let index = self.hash_index_tree()?;
        let credentials = self.credentials_tree()?;

        if let Some(id) = index
            .get(hash.as_bytes())
            .map_err(|e| Error::Origin(e.to_string()))?
        {
            if let Some(bytes) = credentials
                .get(&id)
                .map_err(|e| Error::Origin(e.to_string()))?
            {
                return Ok(Some(Self::decode(&bytes)?));
            }
        }

        Ok(None)
    }

    async fn insert(&self, credential: Credential) -> Result<()> {
        let credentials = self.credentials_tree()?;
        let index = self.hash_index_tree()?;

        if credentials
            .contains_key(credential.id.as_bytes())
            .map_err(|e| Error::Origin(e.to_string()))?
        {
            return Err(Error::Origin(format!(
                "credential {} already exists",
                credential.id
            )));
        }

        let bytes = serde_json::to_vec(&credential)
            .map_err(|e| Error::Origin(format!("failed to serialize credential: {e}")))?;

        credentials
            .insert(credential.id.as_bytes(), bytes)
            .map_err(|e| Error::Origin(e.to_string()))?;
        index
            .insert(credential.hash.as_bytes(), credential.id.as_bytes())
            .map_err(|e| Error::Origin(e.to_string()))?;

        self.db
            .flush_async()
            .await
            .map_err(|e| Error::Origin(e.to_string()))?;

        Ok(())
    }

    async fn mark_deleted(&self, id: &str) -> Result<()> {
        let credentials = self.credentials_tree()?;

        let Some(bytes) = credentials
            .get(id.as_bytes())
            .map_err(|e| Error::Origin(e.to_string()))?
        else {
            return Err(Error::NotFound);
        };

        let mut credential = Self::decode(&bytes)?;
        // The tombstone is one-way; a second deletion reads as not-found,
        // the same as a credential that never existed.
        if credential.is_deleted() {
            return Err(Error::NotFound);
        }
        credential.deleted_at = Some(Utc::now());

        let updated = serde_json::to_vec(&credential)
            .map_err(|e| Error::Origin(format!("failed to serialize credential: {e}")))?;
        credentials
            .insert(id.as_bytes(), updated)
            .map_err(|e| Error::Origin(e.to_string()))?;

        self.db
            .flush_async()
            .await
            .map_err(|e| Error::Origin(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, SledOriginStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SledOriginStore::new(dir.path().join("origin.sled")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn fetch_by_id_and_hash_round_trip() {
        let (_dir, store) = store();
        let credential = Credential::new("ws_1", Some("ci token".into()), "hash_1".into());

        store.insert(credential.clone()).await.unwrap();

        let by_id = store.fetch_by_id(&credential.id).await.unwrap().unwrap();
        assert_eq!(by_id, credential);

        let by_hash = store.fetch_by_hash("hash_1").await.unwrap().unwrap();
        assert_eq!(by_hash, credential);

        assert!(store.fetch_by_id("key_missing").await.unwrap().is_none());
        assert!(store.fetch_by_hash("hash_missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_id() {
        let (_dir, store) = store();
        let credential = Credential::new("ws_1", None, "hash_1".into());

        store.insert(credential.clone()).await.unwrap();
        let err = store.insert(credential).await.unwrap_err();
        assert!(matches!(err, Error::Origin(_)));
    }

    #[tokio::test]
    async fn mark_deleted_sets_tombstone_once() {
        let (_dir, store) = store();
        let credential = Credential::new("ws_1", None, "hash_1".into());
        store.insert(credential.clone()).await.unwrap();

        store.mark_deleted(&credential.id).await.unwrap();

        let fetched = store.fetch_by_id(&credential.id).await.unwrap().unwrap();
        assert!(fetched.is_deleted());

        // One-way transition: a second deletion is not-found.
        let err = store.mark_deleted(&credential.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound));
    }

    #[tokio::test]
    async fn mark_deleted_missing_credential_is_not_found() {
        let (_dir, store) = store();
        let err = store.mark_deleted("key_missing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound));
    }
}
