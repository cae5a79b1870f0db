use crate::auth;
use crate::handlers::status_for;
use crate::models::{
    CreateKeyRequest, CreateKeyResponse, DeleteKeyRequest, DeleteKeyResponse, GetKeyRequest,
    KeyResponse, VerifyKeyRequest, VerifyKeyResponse,
};
use crate::state::AppState;
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use keygrid::domain::Verification;
use tracing::info;

/// POST /v1/keys.createKey
pub async fn create_key(
    State(state): State<AppState>,
    Json(req): Json<CreateKeyRequest>,
) -> Result<Json<CreateKeyResponse>, StatusCode> {
    if req.workspace_id.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    info!(workspace_id = %req.workspace_id, "create key");

    match state.credentials.create(&req.workspace_id, req.name).await {
        Ok(created) => Ok(Json(CreateKeyResponse {
            key_id: created.key_id,
            key: created.secret,
        })),
        Err(err) => Err(status_for(&err)),
    }
}

/// POST /v1/keys.verifyKey
pub async fn verify_key(
    State(state): State<AppState>,
    Json(req): Json<VerifyKeyRequest>,
) -> Result<Json<VerifyKeyResponse>, StatusCode> {
    if req.key.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    match state.verification.verify(&req.key).await {
        Ok(Verification::Valid {
            key_id,
            workspace_id,
        }) => Ok(Json(VerifyKeyResponse {
            valid: true,
            code: None,
            key_id: Some(key_id),
            workspace_id: Some(workspace_id),
        })),
        Ok(Verification::NotFound) => Ok(Json(VerifyKeyResponse {
            valid: false,
            code: Some("NOT_FOUND".into()),
            key_id: None,
            workspace_id: None,
        })),
        Err(err) => Err(status_for(&err)),
    }
}

/// POST /v1/keys.getKey
pub async fn get_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<GetKeyRequest>,
) -> Result<Json<KeyResponse>, StatusCode> {
    if req.key_id.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let workspace_id = auth::authorize_workspace(&state.verification, &headers)
        .await
        .map_err(|err| status_for(&err))?;

    match state.credentials.get(&workspace_id, &req.key_id).await {
        Ok(credential) => Ok(Json(KeyResponse {
            key_id: credential.id,
            workspace_id: credential.workspace_id,
            name: credential.name,
            created_at: credential.created_at,
        })),
        Err(err) => Err(status_for(&err)),
    }
}

/// POST /v1/keys.deleteKey
pub async fn delete_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<DeleteKeyRequest>,
) -> Result<Json<DeleteKeyResponse>, StatusCode> {
    if req.key_id.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let workspace_id = auth::authorize_workspace(&state.verification, &headers)
        .await
        .map_err(|err| status_for(&err))?;

    info!(key_id = %req.key_id, "delete key");

    match state.credentials.delete(&workspace_id, &req.key_id).await {
        Ok(()) => Ok(Json(DeleteKeyResponse {})),
        Err(err) => Err(status_for(&err)),
    }
}
