use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An API credential as stored by the origin. The cache only ever holds
/// copies of this; mutations go through the origin store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credential {
    pub id: String,
    pub workspace_id: String,
    /// SHA-256 hex digest of the secret. The plaintext secret is never stored.
    pub hash: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Tombstone. Transitions once from None to Some and is never reverted.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn new(workspace_id: impl Into<String>, name: Option<String>, hash: String) -> Self {
        Self {
            id: format!("key_{}", Uuid::new_v4().simple()),
            workspace_id: workspace_id.into(),
            hash,
            name,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn owned_by(&self, workspace_id: &str) -> bool {
        self.workspace_id == workspace_id
    }
}

/// Cache key scoped by entity type and identifier, e.g. `credential:key_123`
/// or `verification:ab34...`. Constructed only through the typed builders so
/// the two namespaces can share one store without colliding.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn credential(id: &str) -> Self {
        Self(format!("credential:{id}"))
    }

    pub fn verification(hash: &str) -> Self {
        Self(format!("verification:{hash}"))
    }

    /// Rebuild a key from its wire form. Only transport decoders should
    /// need this.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of verifying a presented secret. A credential that does not
/// exist, is tombstoned, or belongs to another workspace all collapse into
/// `NotFound` so that callers cannot probe for existence.
#[derive(Debug, Clone, PartialEq)]
pub enum Verification {
    Valid { key_id: String, workspace_id: String },
    NotFound,
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verification::Valid { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_keys_are_namespaced_by_entity() {
        let by_id = CacheKey::credential("key_1");
        let by_hash = CacheKey::verification("key_1");
        assert_eq!(by_id.as_str(), "credential:key_1");
        assert_eq!(by_hash.as_str(), "verification:key_1");
        assert_ne!(by_id, by_hash);
    }

    #[test]
    fn tombstone_starts_unset() {
        let cred = Credential::new("ws_1", None, "abc".into());
        assert!(!cred.is_deleted());
        assert!(cred.id.starts_with("key_"));
        assert!(cred.owned_by("ws_1"));
        assert!(!cred.owned_by("ws_2"));
    }
}
