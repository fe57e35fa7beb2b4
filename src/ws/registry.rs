//! Connection registry: which users are currently reachable for push
//! delivery, and the moment they stop being.
//!
//! One authoritative connection per identity — a reconnect replaces the
//! previous entry (last connect wins) and the superseded sender stops
//! receiving pushes immediately. Disconnect events arrive keyed by handle,
//! not identity, so a reverse map resolves them; the forward entry is only
//! removed when the disconnecting handle still matches the recorded one,
//! otherwise a late disconnect from a dead session would evict the live one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use super::ConnectionSender;

/// Opaque id for one live transport session.
pub type ConnectionId = u64;

/// Live connection record for one identity.
#[derive(Clone)]
pub struct ConnectionEntry {
    pub handle: ConnectionId,
    pub sender: ConnectionSender,
    pub display_name: String,
}

#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    /// identity -> live connection
    forward: DashMap<String, ConnectionEntry>,
    /// handle -> identity (disconnects arrive keyed by handle)
    reverse: DashMap<ConnectionId, String>,
    next_handle: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly verified connection and return its handle.
    /// Replaces any previous entry for the identity; the replaced handle's
    /// reverse entry stays until its own disconnect event cleans it up.
    pub fn register(
        &self,
        identity: &str,
        display_name: &str,
        sender: ConnectionSender,
    ) -> ConnectionId {
        let handle = self.inner.next_handle.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner.reverse.insert(handle, identity.to_string());

        let previous = self.inner.forward.insert(
            identity.to_string(),
            ConnectionEntry {
                handle,
                sender,
                display_name: display_name.to_string(),
            },
        );

        if let Some(prev) = previous {
            tracing::debug!(
                identity = %identity,
                old_handle = prev.handle,
                new_handle = handle,
                "Connection replaced by reconnect"
            );
        } else {
            tracing::debug!(identity = %identity, handle = handle, "Connection registered");
        }

        handle
    }

    /// Handle a disconnect event. A handle that was never registered, already
    /// cleaned up, or superseded by a reconnect is a no-op.
    pub fn unregister(&self, handle: ConnectionId) {
        let Some((_, identity)) = self.inner.reverse.remove(&handle) else {
            return;
        };

        let removed = self
            .inner
            .forward
            .remove_if(&identity, |_, entry| entry.handle == handle);

        if removed.is_some() {
            tracing::debug!(identity = %identity, handle = handle, "Connection unregistered");
        } else {
            tracing::debug!(
                identity = %identity,
                handle = handle,
                "Stale disconnect ignored, newer connection on record"
            );
        }
    }

    pub fn is_online(&self, identity: &str) -> bool {
        self.inner.forward.contains_key(identity)
    }

    /// Current authoritative handle for an identity, if connected.
    pub fn handle_for(&self, identity: &str) -> Option<ConnectionId> {
        self.inner.forward.get(identity).map(|e| e.handle)
    }

    /// Push channel for an identity's live connection, if connected.
    pub fn sender_for(&self, identity: &str) -> Option<ConnectionSender> {
        self.inner.forward.get(identity).map(|e| e.sender.clone())
    }

    pub fn display_name_for(&self, identity: &str) -> Option<String> {
        self.inner
            .forward
            .get(identity)
            .map(|e| e.display_name.clone())
    }

    pub fn online_count(&self) -> usize {
        self.inner.forward.len()
    }
}
