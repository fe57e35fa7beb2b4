//! Ephemeral chat coordinator: point-to-point messaging layered on the
//! connection registry. Delivery is fire-and-forget; a user who misses
//! messages gets the full room buffer replayed on their next connect.

pub mod rooms;

pub use rooms::{RoomMessage, RoomTable};

use crate::config::ChatConfig;
use crate::state::AppState;
use crate::ws::protocol::{send_event, ServerEvent};
use crate::ws::ConnectionSender;

fn label_for(state: &AppState, identity: &str) -> String {
    state
        .connections
        .display_name_for(identity)
        .unwrap_or_else(|| identity.to_string())
}

/// Join a room, creating it on first touch, and acknowledge the join to the
/// other subscribed members.
pub fn join_room(state: &AppState, room_key: &str, identity: &str) {
    let outcome = state.rooms.join(room_key, identity);

    tracing::debug!(
        room = %room_key,
        identity = %identity,
        newly_joined = outcome.newly_joined,
        "Room join"
    );

    let ack = ServerEvent::status(format!("{} se unió a la sala", label_for(state, identity)));
    for member in &outcome.other_subscribed {
        if let Some(tx) = state.connections.sender_for(member) {
            send_event(&tx, &ack);
        }
    }
}

/// Out-of-band chat-invite signal to the invitee's own connection, whether or
/// not they have joined the room yet. Offline invitees find out through the
/// room buffer replay instead; not an error.
pub fn notify_invitee(state: &AppState, room_key: &str, initiator: &str, invitee: &str) {
    match state.connections.sender_for(invitee) {
        Some(tx) => {
            send_event(
                &tx,
                &ServerEvent::ChatInvite {
                    room: room_key.to_string(),
                    message: format!(
                        "{} quiere chatear contigo",
                        label_for(state, initiator)
                    ),
                },
            );
        }
        None => {
            tracing::debug!(room = %room_key, invitee = %invitee, "Invitee offline, invite not pushed");
        }
    }
}

/// Append a message to a room and fan it out to the subscribed members that
/// are online. Messages for unknown rooms are dropped and logged, never
/// surfaced to the sender as a failure.
pub fn send_message(state: &AppState, room_key: &str, sender: &str, body: String) {
    let Some(recipients) = state.rooms.append(room_key, sender, &body) else {
        tracing::debug!(room = %room_key, sender = %sender, "Message for unknown room dropped");
        return;
    };

    let event = ServerEvent::Message {
        room: room_key.to_string(),
        sender: sender.to_string(),
        body,
    };
    for member in &recipients {
        if let Some(tx) = state.connections.sender_for(member) {
            send_event(&tx, &event);
        }
    }
}

/// Drop the live subscription and acknowledge the departure to whoever is
/// still subscribed. Room state stays for later replay.
pub fn leave_room(state: &AppState, room_key: &str, identity: &str) {
    let Some(remaining) = state.rooms.unsubscribe(room_key, identity) else {
        tracing::debug!(room = %room_key, identity = %identity, "Leave for unknown room ignored");
        return;
    };

    let ack = ServerEvent::status(format!(
        "{} abandonó la sala",
        label_for(state, identity)
    ));
    for member in &remaining {
        if let Some(tx) = state.connections.sender_for(member) {
            send_event(&tx, &ack);
        }
    }
}

/// Replay every buffered message of every room the identity has participated
/// in, in arrival order, over a freshly established connection. There is no
/// last-read marker; each reconnect re-sends the full buffer.
pub fn replay_pending(state: &AppState, identity: &str, tx: &ConnectionSender) {
    for (room_key, messages) in state.rooms.history_for(identity) {
        for msg in messages {
            send_event(
                tx,
                &ServerEvent::Message {
                    room: room_key.clone(),
                    sender: msg.sender,
                    body: msg.body,
                },
            );
        }
    }
}

/// Spawn the background sweeper that bounds room growth.
/// Rooms idle past the TTL are evicted, then oldest-first above the cap.
pub fn spawn_room_sweeper(rooms: RoomTable, config: ChatConfig) {
    tokio::spawn(async move {
        let ttl = std::time::Duration::from_secs(config.room_ttl_secs);
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(config.sweep_interval_secs)).await;

            let evicted = rooms.sweep(ttl, config.max_rooms);
            if evicted > 0 {
                tracing::info!(evicted, remaining = rooms.len(), "Swept idle chat rooms");
            }
        }
    });
}
