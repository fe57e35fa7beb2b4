use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};

use crate::auth::verifier::{IdentityVerifier, VerifiedIdentity};
use crate::db::models::User;
use crate::directory;
use crate::error::ApiError;
use crate::state::AppState;

/// Verifier handle stored in request extensions for the extractor.
#[derive(Clone)]
pub struct VerifierHandle(pub Arc<dyn IdentityVerifier>);

/// Verified caller identity extracted from the Authorization: Bearer header.
/// Implements axum's FromRequestParts for use as an extractor. Handlers that
/// need the durable local user resolve it through the directory afterwards.
#[derive(Debug, Clone)]
pub struct Identity(pub VerifiedIdentity);

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(StatusCode::UNAUTHORIZED)?;

        // Get the verifier from request extensions (set by middleware layer)
        let verifier = parts
            .extensions
            .get::<VerifierHandle>()
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

        let verified = verifier
            .0
            .verify(token)
            .map_err(|_| StatusCode::UNAUTHORIZED)?;

        Ok(Identity(verified))
    }
}

/// Resolve the authenticated caller to their local user record.
/// A valid credential for an identity not registered on the platform is 403.
pub async fn require_user(state: &AppState, identity: &Identity) -> Result<User, ApiError> {
    let db = state.db.clone();
    let id = identity.0.identity.clone();

    tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| ApiError::Internal("DB lock poisoned".to_string()))?;
        directory::user_for_identity(&conn, &id).map_err(|e| ApiError::Internal(e.to_string()))
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??
    .ok_or_else(|| ApiError::Forbidden("Usuario no registrado en la plataforma".to_string()))
}
