use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::chat;
use crate::directory;
use crate::notifications::dispatch;
use crate::state::AppState;
use crate::ws::protocol::{self, send_event, ServerEvent};

/// Ping interval: server sends WebSocket ping every 30 seconds.
/// Prevents connection leaks from abrupt disconnects.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Pong timeout: if pong not received within 10 seconds after ping, close.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the actor-per-connection pattern for an authenticated WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Reader task: processes incoming events, dispatches to protocol handlers
///
/// The mpsc channel allows any part of the system to push to this client by
/// cloning the sender. Registering in the connection registry supersedes any
/// previous connection for the same identity; cleanup at the end is guarded
/// by the handle so a slow-to-close old session never evicts its successor.
pub async fn run_connection(
    socket: WebSocket,
    state: AppState,
    identity: String,
    display_name: String,
) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    let handle = state.connections.register(&identity, &display_name, tx.clone());

    tracing::info!(
        identity = %identity,
        handle = handle,
        "WebSocket actor started"
    );

    // Spawn writer task: forwards mpsc messages to WebSocket sink
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    send_event(&tx, &ServerEvent::status("conectado"));

    // Catch-up: unread notifications in creation order, then buffered chat
    // history for every room this identity participated in.
    let local_user = {
        let db = state.db.clone();
        let ident = identity.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().ok()?;
            directory::user_for_identity(&conn, &ident).ok().flatten()
        })
        .await
        .ok()
        .flatten()
    };
    if let Some(user) = &local_user {
        dispatch::on_connect_replay(&state.db, &user.id, &tx).await;
    }
    chat::replay_pending(&state, &identity, &tx);

    // Track pong reception
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();

    // Spawn ping task: sends periodic pings and monitors pong responses
    let ping_tx = tx.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(PING_INTERVAL);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                // Writer task has died — connection is gone
                break;
            }

            match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
                Ok(Some(())) => {
                    // Pong received, continue
                }
                _ => {
                    tracing::warn!("Pong timeout, closing connection");
                    let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "Pong timeout".into(),
                    })));
                    break;
                }
            }
        }
    });

    // Reader loop: process incoming WebSocket messages
    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    protocol::handle_text_message(&text, &tx, &state, &identity);
                }
                Message::Binary(_) => {
                    // Protocol is JSON text frames; binary is unexpected
                    tracing::debug!(
                        identity = %identity,
                        "Received binary message (expected JSON text)"
                    );
                }
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(
                        identity = %identity,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    identity = %identity,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                // Stream ended — client disconnected
                tracing::info!(identity = %identity, "WebSocket stream ended");
                break;
            }
        }
    }

    // Cleanup: abort writer and ping tasks
    writer_handle.abort();
    ping_handle.abort();

    // Handle-guarded removal: a no-op if a newer connection replaced us
    state.connections.unregister(handle);

    tracing::info!(
        identity = %identity,
        handle = handle,
        "WebSocket actor stopped"
    );
}

/// Writer task: receives messages from mpsc channel and forwards them to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed — connection is broken
            break;
        }
    }
}
