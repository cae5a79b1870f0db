use axum::http::{HeaderMap, header};
use keygrid::domain::Verification;
use keygrid::services::VerificationService;
use shared::{Error, Result};

/// Extract the Bearer token from the Authorization header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str> {
    let header_value = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(Error::Unauthorized)?;

    match header_value.split_once(' ') {
        Some(("Bearer", token)) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(Error::Unauthorized),
    }
}

/// Verify the caller's credential; its workspace scopes everything the
/// request is allowed to touch.
pub async fn authorize_workspace(
    verification: &VerificationService,
    headers: &HeaderMap,
) -> Result<String> {
    let token = bearer_token(headers)?;
    match verification.verify(token).await? {
        Verification::Valid { workspace_id, .. } => Ok(workspace_id),
        Verification::NotFound => Err(Error::Unauthorized),
    }
}
