//! Notification dispatcher: persist first, push live as a best-effort
//! optimization. Correctness never depends on the push succeeding — an
//! offline target discovers the record through polling or connect-time
//! replay.

use crate::db::DbPool;
use crate::db::models::Notification;
use crate::directory;
use crate::state::AppState;
use crate::ws::protocol::{send_event, ServerEvent};
use crate::ws::ConnectionSender;

use super::store::{self, NewNotification, StoreError};

/// Persist a notification, then push it to the target if they are connected.
/// Persistence failure propagates to the caller; push failure does not.
pub async fn create_and_push(
    state: &AppState,
    new: NewNotification,
) -> Result<Notification, StoreError> {
    let db = state.db.clone();
    let notification = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StoreError::Lock)?;
        store::insert(&conn, &new)
    })
    .await
    .map_err(|_| StoreError::Lock)??;

    push_if_online(state, &notification).await;
    Ok(notification)
}

/// Resolve the target's live identity and deliver over their connection.
/// An offline target is a normal outcome, not an error.
pub async fn push_if_online(state: &AppState, notification: &Notification) {
    let db = state.db.clone();
    let user_id = notification.user_id.clone();

    let identity = tokio::task::spawn_blocking(move || {
        let conn = db.lock().ok()?;
        directory::identity_for_user(&conn, &user_id).ok().flatten()
    })
    .await
    .ok()
    .flatten();

    let Some(identity) = identity else {
        tracing::warn!(
            user_id = %notification.user_id,
            "No identity on record for notification target"
        );
        return;
    };

    match state.connections.sender_for(&identity) {
        Some(tx) => {
            send_event(&tx, &ServerEvent::from_notification(notification));
            tracing::debug!(
                identity = %identity,
                notification_id = %notification.id,
                "Notification pushed"
            );
        }
        None => {
            tracing::debug!(
                identity = %identity,
                notification_id = %notification.id,
                "Target offline, notification awaits poll"
            );
        }
    }
}

/// Catch-up replay right after a successful connect: every unread
/// notification for the user, in creation order, over the fresh handle.
pub async fn on_connect_replay(db: &DbPool, user_id: &str, tx: &ConnectionSender) {
    let db = db.clone();
    let uid = user_id.to_string();

    let pending = tokio::task::spawn_blocking(move || {
        let conn = db.lock().ok()?;
        store::unread_in_creation_order(&conn, &uid).ok()
    })
    .await
    .ok()
    .flatten()
    .unwrap_or_default();

    if pending.is_empty() {
        return;
    }

    tracing::debug!(
        user_id = %user_id,
        count = pending.len(),
        "Replaying unread notifications on connect"
    );
    for notification in &pending {
        send_event(tx, &ServerEvent::from_notification(notification));
    }
}
