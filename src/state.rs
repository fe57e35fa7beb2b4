use std::sync::Arc;

use crate::auth::verifier::IdentityVerifier;
use crate::chat::RoomTable;
use crate::db::DbPool;
use crate::ws::ConnectionRegistry;

/// Shared application state passed to all handlers via axum State extractor.
///
/// The registry and room table are process-local. Running more than one
/// replica needs an external pub/sub fan-out; out of scope for the current
/// single-process design.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// Live WebSocket connections, one authoritative handle per identity
    pub connections: ConnectionRegistry,
    /// In-memory chat rooms
    pub rooms: RoomTable,
    /// Credential verification seam (external identity provider)
    pub verifier: Arc<dyn IdentityVerifier>,
}
