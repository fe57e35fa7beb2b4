//! Database row types for all tables.
//! These correspond 1:1 to the SQLite schema defined in migrations.rs.

use serde::Serialize;

/// User record in the users table.
/// `identity` is the stable uid issued by the external identity provider;
/// `id` is the local durable key referenced by notifications and requests.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub identity: String,
    pub display_name: String,
    pub email: String,
    pub phone_country: Option<String>,
    pub phone_local: Option<String>,
    pub created_at: String,
}

impl User {
    /// Contact datum shown to the other party, by requested channel.
    pub fn contact_datum(&self, contact_type: &str) -> String {
        if contact_type == "whatsapp" {
            format!(
                "{} {}",
                self.phone_country.as_deref().unwrap_or(""),
                self.phone_local.as_deref().unwrap_or("")
            )
            .trim()
            .to_string()
        } else {
            self.email.clone()
        }
    }
}

/// Publication ownership record (listings live in the main backend).
#[derive(Debug, Clone)]
pub struct Publication {
    pub id: String,
    pub user_id: String,
    pub title: String,
}

/// Durable notification. Immutable once created except for `read` and deletion.
/// Serialized field names match the platform's existing frontend contract.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "id_usuario")]
    pub user_id: String,
    #[serde(rename = "id_publicacion")]
    pub publication_id: Option<String>,
    #[serde(rename = "id_referencia")]
    pub reference_id: Option<String>,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "descripcion")]
    pub body: String,
    #[serde(rename = "tipo")]
    pub kind: String,
    #[serde(rename = "fecha_creacion")]
    pub created_at: String,
    #[serde(rename = "leido")]
    pub read: bool,
}

/// Notification type tags consumed by the frontend.
pub mod kind {
    pub const COMMENT: &str = "comentario";
    pub const CONTACT_REQUEST: &str = "solicitud_contacto";
    pub const CONTACT_ACCEPTED: &str = "contacto_aceptado";
    pub const CONTACT_INFO: &str = "info_contacto";
}

/// Contact request state values. Terminal once resolved.
pub const CONTACT_PENDING: i64 = 0;
pub const CONTACT_ACCEPTED: i64 = 1;
pub const CONTACT_REJECTED: i64 = 2;

/// Contact request row.
#[derive(Debug, Clone)]
pub struct ContactRequest {
    pub id: String,
    pub requester_id: String,
    pub owner_id: String,
    pub publication_id: String,
    pub message: String,
    pub contact_type: String,
    pub state: i64,
    pub created_at: String,
}
