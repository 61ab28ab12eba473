//! Presence rooms and event fan-out to connected WebSocket clients.
//!
//! Two room families exist: the singleton admin room and one room per
//! customer. Rooms are implicit — created on first join, gone with the
//! last leave — and entirely process-local; after a restart every client
//! reconnects and membership is rebuilt from scratch.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use metrics::counter;
use storefront_core::{ConnectionId, ServerFrame, UserId};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::connection::ClientConnection;
use crate::metrics::WS_BROADCAST_DROPS_TOTAL;

/// Maximum total lifetime message drops before a slow client is evicted
/// from every room.
const MAX_TOTAL_DROPS: u64 = 100;

/// Logical broadcast group key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoomKey {
    /// Every authenticated admin session.
    Admin,
    /// All sessions of one customer.
    User(UserId),
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => f.write_str("adminRoom"),
            Self::User(id) => write!(f, "user_{id}"),
        }
    }
}

/// In-memory mapping from room key to the set of connected sessions.
///
/// Mutated only by the session gateway; read by the event router.
pub struct RoomDirectory {
    rooms: RwLock<HashMap<RoomKey, HashMap<ConnectionId, Arc<ClientConnection>>>>,
}

impl RoomDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Add a session to a room. Creates the room on first use; idempotent.
    pub async fn join(&self, key: RoomKey, connection: Arc<ClientConnection>) {
        let mut rooms = self.rooms.write().await;
        let members = rooms.entry(key.clone()).or_default();
        if members.insert(connection.id.clone(), connection).is_none() {
            debug!(room = %key, members = members.len(), "session joined room");
        }
    }

    /// Remove a session from a room. No-op when absent.
    pub async fn leave(&self, key: &RoomKey, connection_id: &ConnectionId) {
        let mut rooms = self.rooms.write().await;
        if let Some(members) = rooms.get_mut(key) {
            if members.remove(connection_id).is_some() {
                debug!(room = %key, "session left room");
            }
            if members.is_empty() {
                let _ = rooms.remove(key);
            }
        }
    }

    /// Remove a session from every room. Used by disconnect handling;
    /// idempotent.
    pub async fn leave_all(&self, connection_id: &ConnectionId) {
        let mut rooms = self.rooms.write().await;
        rooms.retain(|_, members| {
            let _ = members.remove(connection_id);
            !members.is_empty()
        });
    }

    /// The user room this session currently occupies, if any.
    ///
    /// A session is in at most one user room; the gateway relies on this
    /// to keep the invariant when a client re-authenticates.
    pub async fn user_room_of(&self, connection_id: &ConnectionId) -> Option<RoomKey> {
        let rooms = self.rooms.read().await;
        rooms
            .iter()
            .find(|(key, members)| {
                matches!(key, RoomKey::User(_)) && members.contains_key(connection_id)
            })
            .map(|(key, _)| key.clone())
    }

    /// Whether a session is currently a member of a room.
    pub async fn is_member(&self, key: &RoomKey, connection_id: &ConnectionId) -> bool {
        let rooms = self.rooms.read().await;
        rooms
            .get(key)
            .is_some_and(|members| members.contains_key(connection_id))
    }

    /// Number of sessions in a room (0 when the room does not exist).
    pub async fn member_count(&self, key: &RoomKey) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(key).map_or(0, HashMap::len)
    }

    /// Number of live rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Serialize a frame once and deliver it to every session in the room.
    ///
    /// Sessions whose channel is full or closed are skipped without
    /// blocking the rest; chronically slow sessions are evicted from all
    /// rooms. An empty or missing room is a silent no-op. Returns the
    /// number of sessions the frame was handed to.
    pub async fn broadcast(&self, key: &RoomKey, frame: &ServerFrame) -> usize {
        let json = match serde_json::to_string(frame) {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(event = frame.event_name(), error = %e, "failed to serialize frame");
                return 0;
            }
        };

        let mut to_evict = Vec::new();
        let mut recipients = 0usize;
        {
            let rooms = self.rooms.read().await;
            let Some(members) = rooms.get(key) else {
                debug!(room = %key, event = frame.event_name(), "broadcast to empty room");
                return 0;
            };
            for conn in members.values() {
                if conn.send(Arc::clone(&json)) {
                    recipients += 1;
                } else {
                    counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
                    let drops = conn.drop_count();
                    if drops >= MAX_TOTAL_DROPS {
                        warn!(conn_id = %conn.id, room = %key, drops, "evicting slow client");
                        to_evict.push(conn.id.clone());
                    } else {
                        warn!(conn_id = %conn.id, room = %key, total_drops = drops, "failed to send frame (channel full)");
                    }
                }
            }
            debug!(room = %key, event = frame.event_name(), recipients, "broadcast frame");
        }

        for conn_id in &to_evict {
            self.leave_all(conn_id).await;
        }
        recipients
    }
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
