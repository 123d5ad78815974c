//! Server state: rooms keyed by their 4-digit code, each holding the
//! host's and (once joined) the guest's outbound sender. All mutation
//! goes through `DashMap` for lock-free concurrent access from however
//! many connection tasks are live.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use rand::Rng;
use tokio::sync::mpsc;

use crate::protocol::ServerMessage;

/// Default time a room may sit unjoined before the periodic reaper
/// evaporates it.
const DEFAULT_ROOM_TTL_SECS: u64 = 10 * 60;

pub type ClientSender = mpsc::UnboundedSender<ServerMessage>;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub port: u16,
    pub room_ttl_secs: u64,
    pub cleanup_interval_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            room_ttl_secs: DEFAULT_ROOM_TTL_SECS,
            cleanup_interval_secs: 60,
        }
    }
}

struct Room {
    host_id: String,
    host_tx: ClientSender,
    guest_id: Option<String>,
    guest_tx: Option<ClientSender>,
    created_at: Instant,
}

/// Result of trying to pair a guest with a room.
pub enum JoinOutcome {
    Joined { host_client_id: String },
    UnknownRoom,
}

#[derive(Clone)]
pub struct RelayState {
    rooms: Arc<DashMap<String, Room>>,
    /// client id -> room code, so a disconnecting connection can find
    /// (and clean up) the room it belonged to without scanning `rooms`.
    client_rooms: Arc<DashMap<String, String>>,
    pub config: RelayConfig,
}

impl RelayState {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            client_rooms: Arc::new(DashMap::new()),
            config,
        }
    }

    /// Generate a fresh 4-digit code, host a new room under it, and
    /// return the code to announce to the caller.
    pub fn create_room(&self, host_id: &str, host_tx: ClientSender) -> String {
        let code = loop {
            let candidate = rand::thread_rng().gen_range(1000..=9999).to_string();
            if !self.rooms.contains_key(&candidate) {
                break candidate;
            }
            // Collision: regenerate (spec.md §4.7 collision policy).
        };

        self.rooms.insert(
            code.clone(),
            Room {
                host_id: host_id.to_string(),
                host_tx,
                guest_id: None,
                guest_tx: None,
                created_at: Instant::now(),
            },
        );
        self.client_rooms.insert(host_id.to_string(), code.clone());
        code
    }

    /// Pair a guest into an existing room. On success, returns the
    /// host's client id so the caller can log who paired with whom.
    pub fn join_room(&self, code: &str, guest_id: &str, guest_tx: ClientSender) -> JoinOutcome {
        match self.rooms.get_mut(code) {
            Some(mut room) => {
                room.guest_id = Some(guest_id.to_string());
                room.guest_tx = Some(guest_tx);
                self.client_rooms
                    .insert(guest_id.to_string(), code.to_string());
                let _ = room.host_tx.send(ServerMessage::ClientJoined {
                    client_id: guest_id.to_string(),
                });
                JoinOutcome::Joined {
                    host_client_id: room.host_id.clone(),
                }
            }
            None => JoinOutcome::UnknownRoom,
        }
    }

    /// Relay an opaque offer/answer/ice-candidate frame from
    /// `from_client_id` to whichever other participant is in the same
    /// room. No-op if the sender isn't in a room or the room has no
    /// other participant yet.
    pub fn relay(&self, from_client_id: &str, message: ServerMessage) {
        let Some(code) = self.client_rooms.get(from_client_id).map(|c| c.clone()) else {
            return;
        };
        let Some(room) = self.rooms.get(&code) else {
            return;
        };
        if room.host_id == from_client_id {
            if let Some(guest_tx) = &room.guest_tx {
                let _ = guest_tx.send(message);
            }
        } else if room.guest_id.as_deref() == Some(from_client_id) {
            let _ = room.host_tx.send(message);
        }
    }

    /// Called when a connection drops. If the disconnecting client was
    /// a room's host, the room evaporates (spec.md §4.7) and any guest
    /// is notified; if it was a guest, the room survives for the host
    /// to re-pair with someone else.
    pub fn remove_client(&self, client_id: &str) {
        let Some((_, code)) = self.client_rooms.remove(client_id) else {
            return;
        };
        let is_host = self
            .rooms
            .get(&code)
            .map(|room| room.host_id == client_id)
            .unwrap_or(false);

        if is_host {
            if let Some((_, room)) = self.rooms.remove(&code) {
                if let Some(guest_tx) = &room.guest_tx {
                    let _ = guest_tx.send(ServerMessage::Error {
                        message: "host disconnected".into(),
                    });
                }
                if let Some(guest_id) = &room.guest_id {
                    self.client_rooms.remove(guest_id);
                }
            }
        } else if let Some(mut room) = self.rooms.get_mut(&code) {
            if room.guest_id.as_deref() == Some(client_id) {
                room.guest_id = None;
                room.guest_tx = None;
            }
        }
    }

    /// Evaporate rooms that have sat unjoined past `room_ttl_secs`.
    pub fn cleanup_expired(&self) {
        let ttl = std::time::Duration::from_secs(self.config.room_ttl_secs);
        let expired: Vec<String> = self
            .rooms
            .iter()
            .filter(|entry| entry.guest_id.is_none() && entry.created_at.elapsed() > ttl)
            .map(|entry| entry.key().clone())
            .collect();
        for code in expired {
            if let Some((_, room)) = self.rooms.remove(&code) {
                self.client_rooms.remove(&room.host_id);
            }
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
