use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// === Key Operation Models ===

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKeyRequest {
    pub workspace_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKeyResponse {
    pub key_id: String,
    /// The plaintext secret; shown exactly once.
    pub key: String,
}

#[derive(Deserialize)]
pub struct VerifyKeyRequest {
    pub key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyKeyResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetKeyRequest {
    pub key_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyResponse {
    pub key_id: String,
    pub workspace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteKeyRequest {
    pub key_id: String,
}

/// Deletion takes effect locally before the response and on peers within
/// the propagation deadline.
#[derive(Serialize)]
pub struct DeleteKeyResponse {}

#[derive(Serialize)]
pub struct HealthResponse {
    pub message: String,
}
