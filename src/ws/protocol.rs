//! Live-channel protocol: tagged JSON events over WebSocket text frames.
//!
//! Inbound events are validated at the boundary into typed variants; anything
//! that doesn't parse gets a status reply, never a connection drop. Event and
//! payload names follow the platform's existing socket contract (the chat
//! invite signal is `solicitudMensaje` on the wire).

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};

use crate::chat;
use crate::db::models::Notification;
use crate::state::AppState;
use crate::ws::ConnectionSender;

/// Events a client may send after the connection is established.
/// Connect and disconnect are transport-level, not protocol events.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "joinRoom")]
    JoinRoom {
        room: String,
        #[serde(rename = "inviteeIdentity")]
        invitee_identity: Option<String>,
    },
    #[serde(rename = "sendMessage")]
    SendMessage { room: String, body: String },
    #[serde(rename = "leaveRoom")]
    LeaveRoom { room: String },
}

/// Events the server pushes to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "notification")]
    Notification {
        titulo: String,
        descripcion: String,
        id_publicacion: Option<String>,
        id_notificacion: String,
        id_referencia: Option<String>,
    },
    #[serde(rename = "status")]
    Status { message: String },
    #[serde(rename = "message")]
    Message {
        room: String,
        sender: String,
        body: String,
    },
    #[serde(rename = "solicitudMensaje")]
    ChatInvite { room: String, message: String },
}

impl ServerEvent {
    pub fn from_notification(n: &Notification) -> Self {
        ServerEvent::Notification {
            titulo: n.title.clone(),
            descripcion: n.body.clone(),
            id_publicacion: n.publication_id.clone(),
            id_notificacion: n.id.clone(),
            id_referencia: n.reference_id.clone(),
        }
    }

    pub fn status(message: impl Into<String>) -> Self {
        ServerEvent::Status {
            message: message.into(),
        }
    }
}

/// Serialize and send an event over a connection's channel.
/// A send failure means the writer task is gone; the actor cleans up.
pub fn send_event(tx: &ConnectionSender, event: &ServerEvent) {
    match serde_json::to_string(event) {
        Ok(json) => {
            let _ = tx.send(Message::Text(json.into()));
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize server event");
        }
    }
}

/// Handle an incoming text frame: parse the tagged event and dispatch.
pub fn handle_text_message(text: &str, tx: &ConnectionSender, state: &AppState, identity: &str) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(
                identity = %identity,
                error = %e,
                "Failed to parse client event"
            );
            send_event(tx, &ServerEvent::status("evento no reconocido"));
            return;
        }
    };

    match event {
        ClientEvent::JoinRoom {
            room,
            invitee_identity,
        } => {
            chat::join_room(state, &room, identity);
            if let Some(invitee) = invitee_identity {
                chat::notify_invitee(state, &room, identity, &invitee);
            }
        }
        ClientEvent::SendMessage { room, body } => {
            chat::send_message(state, &room, identity, body);
        }
        ClientEvent::LeaveRoom { room } => {
            chat::leave_room(state, &room, identity);
        }
    }
}
