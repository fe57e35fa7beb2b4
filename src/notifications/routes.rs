//! Polling REST surface for notifications. Push delivery is best-effort;
//! these endpoints are how offline clients catch up.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::auth::middleware::{require_user, Identity};
use crate::db::models::Notification;
use crate::error::ApiError;
use crate::state::AppState;

use super::store;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Query param name kept from the existing frontend contract.
    #[serde(default)]
    pub solo_no_leidas: bool,
}

/// GET /api/notifications?solo_no_leidas=bool — auth required.
/// Newest first, bounded; this is the endpoint the frontend polls.
pub async fn list(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let user = require_user(&state, &identity).await?;

    let db = state.db.clone();
    let notifications = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| store::StoreError::Lock)?;
        store::list_for_user(&conn, &user.id, query.solo_no_leidas)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(notifications))
}

/// PATCH /api/notifications/{id}/read — auth required, owner only.
pub async fn mark_read(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = require_user(&state, &identity).await?;

    let db = state.db.clone();
    let noti_id = id.clone();
    tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| store::StoreError::Lock)?;
        store::mark_read(&conn, &noti_id, &user.id)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(serde_json::json!({
        "mensaje": "Notificación marcada como leída",
        "id": id,
    })))
}

/// DELETE /api/notifications/{id} — auth required, owner only.
pub async fn delete(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = require_user(&state, &identity).await?;

    let db = state.db.clone();
    tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| store::StoreError::Lock)?;
        store::delete(&conn, &id, &user.id)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(serde_json::json!({ "mensaje": "Notificación eliminada" })))
}
