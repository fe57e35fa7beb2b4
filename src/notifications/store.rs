//! Durable notification records.
//!
//! A notification is immutable once created except for the read flag and
//! deletion. Push delivery is layered on top as a best-effort optimization;
//! this table is the source of truth the polling endpoint reads from.

use chrono::Utc;
use rusqlite::{params, Connection};
use thiserror::Error;
use uuid::Uuid;

use crate::db::models::Notification;

/// Maximum notifications returned per poll, newest first.
pub const LIST_LIMIT: usize = 50;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("notification not found")]
    NotFound,
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("database lock poisoned")]
    Lock,
}

/// Input for a new notification. `read` is almost always false; the one
/// exception is the owner's own contact-history entry, which is born read.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: String,
    pub publication_id: Option<String>,
    pub reference_id: Option<String>,
    pub title: String,
    pub body: String,
    pub kind: String,
    pub read: bool,
}

const COLUMNS: &str =
    "id, user_id, publication_id, reference_id, title, body, kind, created_at, read";

fn row_to_notification(row: &rusqlite::Row<'_>) -> Result<Notification, rusqlite::Error> {
    Ok(Notification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        publication_id: row.get(2)?,
        reference_id: row.get(3)?,
        title: row.get(4)?,
        body: row.get(5)?,
        kind: row.get(6)?,
        created_at: row.get(7)?,
        read: row.get(8)?,
    })
}

/// Persist a notification with a server-assigned id and creation timestamp.
pub fn insert(conn: &Connection, new: &NewNotification) -> Result<Notification, StoreError> {
    let notification = Notification {
        id: Uuid::now_v7().to_string(),
        user_id: new.user_id.clone(),
        publication_id: new.publication_id.clone(),
        reference_id: new.reference_id.clone(),
        title: new.title.clone(),
        body: new.body.clone(),
        kind: new.kind.clone(),
        created_at: Utc::now().to_rfc3339(),
        read: new.read,
    };

    conn.execute(
        "INSERT INTO notifications (id, user_id, publication_id, reference_id, title, body, kind, created_at, read)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            notification.id,
            notification.user_id,
            notification.publication_id,
            notification.reference_id,
            notification.title,
            notification.body,
            notification.kind,
            notification.created_at,
            notification.read,
        ],
    )?;

    Ok(notification)
}

/// Notifications for a user, newest first, bounded by LIST_LIMIT.
/// This backs the polling endpoint the frontend hits every few seconds.
pub fn list_for_user(
    conn: &Connection,
    user_id: &str,
    only_unread: bool,
) -> Result<Vec<Notification>, StoreError> {
    let mut sql = format!("SELECT {COLUMNS} FROM notifications WHERE user_id = ?1");
    if only_unread {
        sql.push_str(" AND read = 0");
    }
    sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ?2");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![user_id, LIST_LIMIT as i64], row_to_notification)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Unread notifications in creation order, for catch-up replay on connect.
pub fn unread_in_creation_order(
    conn: &Connection,
    user_id: &str,
) -> Result<Vec<Notification>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM notifications WHERE user_id = ?1 AND read = 0
         ORDER BY created_at ASC, id ASC"
    ))?;
    let rows = stmt
        .query_map(params![user_id], row_to_notification)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Mark a notification read. Idempotent; marking an already-read record
/// succeeds. NotFound when the id doesn't exist or belongs to another user.
pub fn mark_read(conn: &Connection, id: &str, owner_id: &str) -> Result<(), StoreError> {
    let changed = conn.execute(
        "UPDATE notifications SET read = 1 WHERE id = ?1 AND user_id = ?2",
        params![id, owner_id],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

/// Delete a notification. NotFound when the id doesn't exist or belongs to
/// another user.
pub fn delete(conn: &Connection, id: &str, owner_id: &str) -> Result<(), StoreError> {
    let changed = conn.execute(
        "DELETE FROM notifications WHERE id = ?1 AND user_id = ?2",
        params![id, owner_id],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}
