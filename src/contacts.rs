//! Contact requests between a user and a publication owner.
//!
//! A request is Pending(0) until the owner resolves it to Accepted(1) or
//! Rejected(2); resolved states are terminal. The request and the owner's
//! notification are written in one transaction — for this flow the
//! notification IS the product (the owner has no other way to learn about
//! the request), so one cannot exist without the other.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::middleware::{require_user, Identity};
use crate::db::models::{
    kind, User, CONTACT_ACCEPTED, CONTACT_PENDING, CONTACT_REJECTED,
};
use crate::directory;
use crate::error::ApiError;
use crate::notifications::dispatch;
use crate::notifications::store::{self, NewNotification};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateContactRequest {
    pub id_publicacion: String,
    #[serde(default = "default_contact_type")]
    pub tipo: String,
    #[serde(default)]
    pub mensaje: String,
}

fn default_contact_type() -> String {
    "whatsapp".to_string()
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub accion: String,
}

/// POST /api/contact — auth required.
/// Creates a pending request on a publication and notifies the owner.
pub async fn create(
    State(state): State<AppState>,
    identity: Identity,
    Json(body): Json<CreateContactRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let requester = require_user(&state, &identity).await?;

    let db = state.db.clone();
    let req = body;
    let requester_clone = requester.clone();

    let owner_notification = tokio::task::spawn_blocking(move || {
        let mut conn = db
            .lock()
            .map_err(|_| ApiError::Internal("DB lock poisoned".to_string()))?;

        let publication = directory::publication_by_id(&conn, &req.id_publicacion)
            .map_err(|e| ApiError::Internal(e.to_string()))?
            .ok_or_else(|| ApiError::NotFound("Publicación no encontrada".to_string()))?;

        if publication.user_id == requester_clone.id {
            return Err(ApiError::BadRequest(
                "No puedes contactarte a ti mismo".to_string(),
            ));
        }

        // One pending request per requester/publication pair
        let pending: Option<String> = conn
            .query_row(
                "SELECT id FROM contact_requests
                 WHERE requester_id = ?1 AND publication_id = ?2 AND state = ?3",
                params![requester_clone.id, publication.id, CONTACT_PENDING],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        if pending.is_some() {
            return Err(ApiError::BadRequest(
                "Ya tienes una solicitud pendiente".to_string(),
            ));
        }

        if req.tipo == "whatsapp" && requester_clone.phone_local.is_none() {
            return Err(ApiError::BadRequest(
                "No tienes un número de teléfono configurado".to_string(),
            ));
        }
        let contact_datum = requester_clone.contact_datum(&req.tipo);

        // Request + owner notification commit together
        let tx = conn
            .transaction()
            .map_err(|e| ApiError::Internal(e.to_string()))?;

        let request_id = Uuid::now_v7().to_string();
        tx.execute(
            "INSERT INTO contact_requests
             (id, requester_id, owner_id, publication_id, message, contact_type, state, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                request_id,
                requester_clone.id,
                publication.user_id,
                publication.id,
                req.mensaje,
                req.tipo,
                CONTACT_PENDING,
                Utc::now().to_rfc3339()
            ],
        )
        .map_err(|e| ApiError::Internal(e.to_string()))?;

        let notification = store::insert(
            &tx,
            &NewNotification {
                user_id: publication.user_id.clone(),
                publication_id: Some(publication.id.clone()),
                reference_id: Some(request_id.clone()),
                title: "Nueva solicitud de contacto".to_string(),
                body: format!(
                    "{} quiere contactarte. Dejó su {}: {}. Mensaje: '{}'",
                    requester_clone.display_name,
                    req.tipo.to_uppercase(),
                    contact_datum,
                    req.mensaje
                ),
                kind: kind::CONTACT_REQUEST.to_string(),
                read: false,
            },
        )?;

        tx.commit().map_err(|e| ApiError::Internal(e.to_string()))?;

        Ok::<_, ApiError>(notification)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    dispatch::push_if_online(&state, &owner_notification).await;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "mensaje": "Solicitud enviada con tus datos" })),
    ))
}

/// PATCH /api/contact/{id} — auth required, receiving owner only.
/// Accepting exchanges contact data both ways; rejecting is silent.
pub async fn respond(
    State(state): State<AppState>,
    identity: Identity,
    Path(request_id): Path<String>,
    Json(body): Json<RespondRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let owner = require_user(&state, &identity).await?;

    let accept = match body.accion.as_str() {
        "aceptar" => true,
        "rechazar" => false,
        _ => {
            return Err(ApiError::BadRequest(
                "Acción inválida, usar 'aceptar' o 'rechazar'".to_string(),
            ))
        }
    };

    let db = state.db.clone();
    let owner_clone = owner.clone();
    let req_id = request_id.clone();

    let outcome = tokio::task::spawn_blocking(move || {
        let mut conn = db
            .lock()
            .map_err(|_| ApiError::Internal("DB lock poisoned".to_string()))?;

        let row: Option<(String, String, String, String, i64)> = conn
            .query_row(
                "SELECT requester_id, owner_id, publication_id, contact_type, state
                 FROM contact_requests WHERE id = ?1",
                params![req_id],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| ApiError::Internal(e.to_string()))?;

        let (requester_id, owner_id, publication_id, contact_type, req_state) =
            row.ok_or_else(|| ApiError::NotFound("Solicitud no encontrada".to_string()))?;

        // Only the receiving owner may respond
        if owner_id != owner_clone.id {
            return Err(ApiError::Forbidden("No autorizado".to_string()));
        }

        // Resolved states are terminal
        if req_state != CONTACT_PENDING {
            return Err(ApiError::Conflict(
                "La solicitud ya fue respondida".to_string(),
            ));
        }

        if !accept {
            conn.execute(
                "UPDATE contact_requests SET state = ?2 WHERE id = ?1",
                params![req_id, CONTACT_REJECTED],
            )
            .map_err(|e| ApiError::Internal(e.to_string()))?;
            return Ok::<_, ApiError>(None);
        }

        let requester: User = directory::user_by_id(&conn, &requester_id)
            .map_err(|e| ApiError::Internal(e.to_string()))?
            .ok_or_else(|| ApiError::NotFound("Solicitante no encontrado".to_string()))?;

        // Exchange: each side learns the channel the requester asked for
        let datum_for_requester = owner_clone.contact_datum(&contact_type);
        let datum_for_owner = requester.contact_datum(&contact_type);

        let tx = conn
            .transaction()
            .map_err(|e| ApiError::Internal(e.to_string()))?;

        tx.execute(
            "UPDATE contact_requests SET state = ?2 WHERE id = ?1",
            params![req_id, CONTACT_ACCEPTED],
        )
        .map_err(|e| ApiError::Internal(e.to_string()))?;

        // Requester gets the acceptance with the owner's contact datum
        let requester_notification = store::insert(
            &tx,
            &NewNotification {
                user_id: requester_id.clone(),
                publication_id: Some(publication_id.clone()),
                reference_id: Some(req_id.clone()),
                title: "¡Solicitud Aceptada!".to_string(),
                body: format!(
                    "{} aceptó tu solicitud. Contacto: {}",
                    owner_clone.display_name, datum_for_requester
                ),
                kind: kind::CONTACT_ACCEPTED.to_string(),
                read: false,
            },
        )?;

        // Owner keeps a history entry so the datum survives closing the
        // popup; born read because it's their own action
        store::insert(
            &tx,
            &NewNotification {
                user_id: owner_clone.id.clone(),
                publication_id: Some(publication_id),
                reference_id: Some(req_id.clone()),
                title: "Contacto realizado".to_string(),
                body: format!(
                    "Aceptaste a {}. Su contacto es: {}",
                    requester.display_name, datum_for_owner
                ),
                kind: kind::CONTACT_INFO.to_string(),
                read: true,
            },
        )?;

        tx.commit().map_err(|e| ApiError::Internal(e.to_string()))?;

        Ok(Some((requester_notification, datum_for_owner, contact_type)))
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    match outcome {
        Some((requester_notification, datum_for_owner, contact_type)) => {
            dispatch::push_if_online(&state, &requester_notification).await;
            Ok(Json(serde_json::json!({
                "mensaje": "Respuesta guardada",
                "dato_contacto": datum_for_owner,
                "tipo_contacto": contact_type,
            })))
        }
        None => Ok(Json(serde_json::json!({
            "mensaje": "Respuesta guardada",
            "dato_contacto": null,
            "tipo_contacto": null,
        }))),
    }
}
