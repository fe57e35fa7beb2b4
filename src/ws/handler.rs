use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use serde::Deserialize;

use crate::auth::verifier::VerifyError;
use crate::state::AppState;
use crate::ws::actor;

/// Query parameters for WebSocket connection. Auth is via ?token=credential.
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: String,
}

/// WebSocket close codes:
/// 4001 = credential expired
/// 4002 = credential invalid
const CLOSE_TOKEN_EXPIRED: u16 = 4001;
const CLOSE_TOKEN_INVALID: u16 = 4002;

/// GET /ws?token=credential
/// WebSocket upgrade endpoint. The credential is verified before any registry
/// entry exists; on failure the connection is upgraded then immediately
/// closed with the appropriate close code. On success, spawns the
/// per-connection actor.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    match state.verifier.verify(&params.token) {
        Ok(verified) => {
            tracing::info!(
                identity = %verified.identity,
                "WebSocket connection authenticated"
            );
            ws.on_upgrade(move |socket| {
                actor::run_connection(socket, state, verified.identity, verified.display_name)
            })
        }
        Err(err) => {
            let (close_code, reason) = match err {
                VerifyError::Expired => (CLOSE_TOKEN_EXPIRED, "Token expired"),
                VerifyError::Invalid => (CLOSE_TOKEN_INVALID, "Token invalid"),
            };

            tracing::warn!(
                close_code = close_code,
                reason = reason,
                "WebSocket auth failed"
            );

            ws.on_upgrade(move |mut socket| async move {
                let close_frame = CloseFrame {
                    code: close_code,
                    reason: reason.into(),
                };
                let _ = socket.send(Message::Close(Some(close_frame))).await;
            })
        }
    }
}
