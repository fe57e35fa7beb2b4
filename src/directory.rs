//! User directory and publication ownership lookups.
//!
//! Translates between the durable local user id (used in persisted
//! notifications) and the live provider identity (used by the connection
//! registry). User registration and publication CRUD belong to the main
//! platform backend; the helpers here are the lookup surface this server
//! needs, plus insert shims used by seeding and tests.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::models::{Publication, User};

fn row_to_user(row: &rusqlite::Row<'_>) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: row.get(0)?,
        identity: row.get(1)?,
        display_name: row.get(2)?,
        email: row.get(3)?,
        phone_country: row.get(4)?,
        phone_local: row.get(5)?,
        created_at: row.get(6)?,
    })
}

const USER_COLUMNS: &str =
    "id, identity, display_name, email, phone_country, phone_local, created_at";

/// Look up a user by provider identity. None means the identity is valid at
/// the provider but not registered on this platform.
pub fn user_for_identity(conn: &Connection, identity: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE identity = ?1"),
        params![identity],
        row_to_user,
    )
    .optional()
}

pub fn user_by_id(conn: &Connection, user_id: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![user_id],
        row_to_user,
    )
    .optional()
}

/// Provider identity for a local user id, for registry lookups.
pub fn identity_for_user(conn: &Connection, user_id: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT identity FROM users WHERE id = ?1",
        params![user_id],
        |row| row.get(0),
    )
    .optional()
}

pub fn publication_by_id(
    conn: &Connection,
    publication_id: &str,
) -> rusqlite::Result<Option<Publication>> {
    conn.query_row(
        "SELECT id, user_id, title FROM publications WHERE id = ?1",
        params![publication_id],
        |row| {
            Ok(Publication {
                id: row.get(0)?,
                user_id: row.get(1)?,
                title: row.get(2)?,
            })
        },
    )
    .optional()
}

/// Insert a user record. Returns the generated local id.
pub fn create_user(
    conn: &Connection,
    identity: &str,
    display_name: &str,
    email: &str,
    phone_country: Option<&str>,
    phone_local: Option<&str>,
) -> rusqlite::Result<String> {
    let id = Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO users (id, identity, display_name, email, phone_country, phone_local, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            identity,
            display_name,
            email,
            phone_country,
            phone_local,
            Utc::now().to_rfc3339()
        ],
    )?;
    Ok(id)
}

/// Insert a publication ownership record. Returns the generated id.
pub fn create_publication(
    conn: &Connection,
    user_id: &str,
    title: &str,
) -> rusqlite::Result<String> {
    let id = Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO publications (id, user_id, title, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![id, user_id, title, Utc::now().to_rfc3339()],
    )?;
    Ok(id)
}
