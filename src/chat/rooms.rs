//! In-memory chat room table.
//!
//! Rooms are ephemeral: message buffers live until the process restarts or
//! the sweeper evicts an idle room. No delivery guarantee is offered beyond
//! full-history replay on reconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// One buffered chat message. Append order is arrival order and is never
/// reordered.
#[derive(Debug, Clone)]
pub struct RoomMessage {
    pub sender: String,
    pub body: String,
}

#[derive(Debug)]
struct Room {
    /// Everyone who ever joined; replay targets on reconnect.
    participants: Vec<String>,
    /// Currently subscribed members; fan-out targets for new messages.
    subscribed: Vec<String>,
    messages: Vec<RoomMessage>,
    last_active: Instant,
}

impl Room {
    fn new() -> Self {
        Self {
            participants: Vec::new(),
            subscribed: Vec::new(),
            messages: Vec::new(),
            last_active: Instant::now(),
        }
    }
}

/// Result of a join: whether the participant set changed and who else is
/// currently subscribed (for the join acknowledgement).
pub struct JoinOutcome {
    pub newly_joined: bool,
    pub other_subscribed: Vec<String>,
}

/// Room table keyed by an identity-derived room name.
#[derive(Clone, Default)]
pub struct RoomTable {
    rooms: Arc<DashMap<String, Room>>,
}

impl RoomTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a room, creating it on first touch. Rejoining is a no-op for the
    /// participant set but always restores the live subscription.
    pub fn join(&self, room_key: &str, identity: &str) -> JoinOutcome {
        let mut entry = self.rooms.entry(room_key.to_string()).or_insert_with(Room::new);
        let room = entry.value_mut();
        room.last_active = Instant::now();

        let newly_joined = if room.participants.iter().any(|p| p == identity) {
            false
        } else {
            room.participants.push(identity.to_string());
            true
        };

        let other_subscribed: Vec<String> = room
            .subscribed
            .iter()
            .filter(|p| p.as_str() != identity)
            .cloned()
            .collect();

        if !room.subscribed.iter().any(|p| p == identity) {
            room.subscribed.push(identity.to_string());
        }

        JoinOutcome {
            newly_joined,
            other_subscribed,
        }
    }

    /// Append a message and return the subscribed members to fan out to
    /// (everyone but the sender). None when the room doesn't exist.
    pub fn append(&self, room_key: &str, sender: &str, body: &str) -> Option<Vec<String>> {
        let mut entry = self.rooms.get_mut(room_key)?;
        let room = entry.value_mut();
        room.last_active = Instant::now();
        room.messages.push(RoomMessage {
            sender: sender.to_string(),
            body: body.to_string(),
        });

        Some(
            room.subscribed
                .iter()
                .filter(|p| p.as_str() != sender)
                .cloned()
                .collect(),
        )
    }

    /// Drop the live subscription only; room state and participant history
    /// stay intact. Returns the remaining subscribed members, or None for an
    /// unknown room.
    pub fn unsubscribe(&self, room_key: &str, identity: &str) -> Option<Vec<String>> {
        let mut entry = self.rooms.get_mut(room_key)?;
        let room = entry.value_mut();
        room.subscribed.retain(|p| p != identity);
        Some(room.subscribed.clone())
    }

    /// Buffered history of every room the identity has participated in,
    /// messages in arrival order. Used for reconnect replay.
    pub fn history_for(&self, identity: &str) -> Vec<(String, Vec<RoomMessage>)> {
        self.rooms
            .iter()
            .filter(|entry| entry.value().participants.iter().any(|p| p == identity))
            .map(|entry| (entry.key().clone(), entry.value().messages.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Evict rooms idle longer than `ttl`, then oldest-first down to
    /// `max_rooms`. Returns how many rooms were dropped.
    pub fn sweep(&self, ttl: Duration, max_rooms: usize) -> usize {
        let now = Instant::now();
        let mut evicted = 0;

        let expired: Vec<String> = self
            .rooms
            .iter()
            .filter(|entry| now.duration_since(entry.value().last_active) > ttl)
            .map(|entry| entry.key().clone())
            .collect();
        for key in expired {
            if self.rooms.remove(&key).is_some() {
                evicted += 1;
            }
        }

        if self.rooms.len() > max_rooms {
            let mut by_age: Vec<(String, Instant)> = self
                .rooms
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().last_active))
                .collect();
            by_age.sort_by_key(|(_, last_active)| *last_active);

            let excess = by_age.len().saturating_sub(max_rooms);
            for (key, _) in by_age.into_iter().take(excess) {
                if self.rooms.remove(&key).is_some() {
                    evicted += 1;
                }
            }
        }

        evicted
    }
}
