//! Comments on publications. Creating a comment notifies the publication
//! owner; the notification is best-effort after the comment commits, so a
//! dispatcher failure never fails the comment itself (failures are logged
//! and the owner still sees the comment in the thread).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::middleware::{require_user, Identity};
use crate::db::models::kind;
use crate::directory;
use crate::error::ApiError;
use crate::notifications::dispatch;
use crate::notifications::store::NewNotification;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub id_publicacion: String,
    pub descripcion: String,
    #[serde(default)]
    pub id_anterior: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: String,
    pub id_publicacion: String,
    pub id_usuario: String,
    pub id_anterior: Option<String>,
    pub descripcion: String,
    pub fecha_creacion: String,
}

/// POST /api/comments — auth required.
pub async fn create(
    State(state): State<AppState>,
    identity: Identity,
    Json(body): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let user = require_user(&state, &identity).await?;

    let db = state.db.clone();
    let req = body;
    let commenter_id = user.id.clone();
    let commenter_name = user.display_name.clone();

    // Insert the comment; figure out whether the owner needs a notification
    let (comment_id, owner_notification) = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| ApiError::Internal("DB lock poisoned".to_string()))?;

        let publication = directory::publication_by_id(&conn, &req.id_publicacion)
            .map_err(|e| ApiError::Internal(e.to_string()))?
            .ok_or_else(|| ApiError::NotFound("Publicación no encontrada".to_string()))?;

        let comment_id = Uuid::now_v7().to_string();
        conn.execute(
            "INSERT INTO comments (id, publication_id, user_id, parent_id, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                comment_id,
                req.id_publicacion,
                commenter_id,
                req.id_anterior,
                req.descripcion,
                Utc::now().to_rfc3339()
            ],
        )
        .map_err(|e| ApiError::Internal(e.to_string()))?;

        // No self-notification when commenting on your own publication
        let notification = (publication.user_id != commenter_id).then(|| NewNotification {
            user_id: publication.user_id.clone(),
            publication_id: Some(publication.id.clone()),
            reference_id: None,
            title: format!("{} comentó tu publicación", commenter_name),
            body: format!("Comentó en: '{}'", publication.title),
            kind: kind::COMMENT.to_string(),
            read: false,
        });

        Ok::<_, ApiError>((comment_id, notification))
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    // Best-effort: the comment is already committed, a dispatcher failure
    // only costs the push/poll record
    if let Some(new) = owner_notification {
        if let Err(e) = dispatch::create_and_push(&state, new).await {
            tracing::warn!(
                comment_id = %comment_id,
                error = %e,
                "Comment notification failed"
            );
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "mensaje": "Comentario creado", "id": comment_id })),
    ))
}

/// GET /api/comments/{publication_id}
pub async fn list_for_publication(
    State(state): State<AppState>,
    Path(publication_id): Path<String>,
) -> Result<Json<Vec<CommentResponse>>, ApiError> {
    let db = state.db.clone();

    let comments = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| ApiError::Internal("DB lock poisoned".to_string()))?;

        let mut stmt = conn
            .prepare(
                "SELECT id, publication_id, user_id, parent_id, body, created_at
                 FROM comments WHERE publication_id = ?1 ORDER BY created_at ASC",
            )
            .map_err(|e| ApiError::Internal(e.to_string()))?;

        let rows = stmt
            .query_map(params![publication_id], |row| {
                Ok(CommentResponse {
                    id: row.get(0)?,
                    id_publicacion: row.get(1)?,
                    id_usuario: row.get(2)?,
                    id_anterior: row.get(3)?,
                    descripcion: row.get(4)?,
                    fecha_creacion: row.get(5)?,
                })
            })
            .map_err(|e| ApiError::Internal(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ApiError::Internal(e.to_string()))?;

        Ok::<_, ApiError>(rows)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(comments))
}
