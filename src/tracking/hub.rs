use std::collections::{HashMap, HashSet};
use std::fmt;

use tokio::sync::{RwLock, mpsc};
use tracing::debug;
use uuid::Uuid;

use crate::db::Identity;

pub type ConnId = Uuid;

/// One live client session: the identity resolved at connect time plus the
/// outbound end of its socket writer.
#[derive(Clone)]
pub struct ConnectionHandle {
    pub id: ConnId,
    pub identity: Identity,
    tx: mpsc::UnboundedSender<String>,
}

impl ConnectionHandle {
    pub fn new(id: ConnId, identity: Identity, tx: mpsc::UnboundedSender<String>) -> Self {
        Self { id, identity, tx }
    }

    /// Best-effort delivery; false once the writer half is gone.
    pub fn send(&self, frame: &str) -> bool {
        self.tx.send(frame.to_owned()).is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomId {
    Booking(Uuid),
    Admin,
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomId::Booking(id) => write!(f, "booking_{id}"),
            RoomId::Admin => write!(f, "admin_room"),
        }
    }
}

/// Connection registry plus room membership. Rooms are created on first join
/// and dropped with their last member.
#[derive(Default)]
pub struct Hub {
    connections: RwLock<HashMap<ConnId, ConnectionHandle>>,
    rooms: RwLock<HashMap<RoomId, HashSet<ConnId>>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, handle: ConnectionHandle) {
        self.connections.write().await.insert(handle.id, handle);
    }

    /// Drops the connection and every room membership it held.
    pub async fn unregister(&self, conn_id: ConnId) {
        self.connections.write().await.remove(&conn_id);
        self.rooms.write().await.retain(|_, members| {
            members.remove(&conn_id);
            !members.is_empty()
        });
    }

    /// Idempotent; true when the membership is new.
    pub async fn join(&self, room: RoomId, conn_id: ConnId) -> bool {
        self.rooms
            .write()
            .await
            .entry(room)
            .or_default()
            .insert(conn_id)
    }

    /// Idempotent; true when a membership was actually removed.
    pub async fn leave(&self, room: RoomId, conn_id: ConnId) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(members) = rooms.get_mut(&room) else {
            return false;
        };
        let removed = members.remove(&conn_id);
        if members.is_empty() {
            rooms.remove(&room);
        }
        removed
    }

    pub async fn is_member(&self, room: RoomId, conn_id: ConnId) -> bool {
        self.rooms
            .read()
            .await
            .get(&room)
            .is_some_and(|members| members.contains(&conn_id))
    }

    pub async fn room_size(&self, room: RoomId) -> usize {
        self.rooms.read().await.get(&room).map_or(0, HashSet::len)
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// At-most-once, best-effort fan-out to the room, optionally excluding
    /// the sender. Members whose writer is gone are pruned on the way.
    pub async fn broadcast(&self, room: RoomId, frame: &str, except: Option<ConnId>) {
        let members: Vec<ConnId> = {
            let rooms = self.rooms.read().await;
            match rooms.get(&room) {
                Some(members) => members.iter().copied().collect(),
                None => return,
            }
        };

        let mut dead = Vec::new();
        {
            let connections = self.connections.read().await;
            for conn_id in members {
                if Some(conn_id) == except {
                    continue;
                }
                match connections.get(&conn_id) {
                    Some(handle) if handle.send(frame) => {}
                    _ => dead.push(conn_id),
                }
            }
        }

        for conn_id in dead {
            debug!(%conn_id, room = %room, "pruning dead connection");
            self.unregister(conn_id).await;
        }
    }

    /// Every live connection, rooms ignored.
    pub async fn broadcast_all(&self, frame: &str) {
        let connections = self.connections.read().await;
        for handle in connections.values() {
            let _ = handle.send(frame);
        }
    }
}
