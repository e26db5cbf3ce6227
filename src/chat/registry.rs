use std::collections::{HashMap, hash_map::Entry};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{ChatError, ConnectionId, Envelope, Identity, RoomId};

/// Receiving end of a connection: every envelope broadcast to its room lands here.
pub type Outbox = mpsc::UnboundedReceiver<Arc<Envelope>>;

/// Handle to one live client, as stored in a room's membership set.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    identity: Identity,
    sender: mpsc::UnboundedSender<Arc<Envelope>>,
}

impl Connection {
    pub fn new(identity: Identity) -> (Self, Outbox) {
        let (sender, outbox) = mpsc::unbounded_channel();
        let connection = Self {
            id: ConnectionId::new(),
            identity,
            sender,
        };
        (connection, outbox)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    // Never waits: the outbox is unbounded, so a slow reader cannot stall a room.
    fn deliver(&self, envelope: &Arc<Envelope>) -> Result<(), ChatError> {
        self.sender
            .send(Arc::clone(envelope))
            .map_err(|_| ChatError::DeliveryFailure(self.id))
    }
}

/// Membership sets of every room, shared by all sessions.
///
/// Rooms come into existence on first join and disappear with their last
/// member. Each connection sits in at most one room.
#[derive(Clone, Default)]
pub struct Registry {
    /// Room id to its members
    rooms: Arc<DashMap<RoomId, HashMap<ConnectionId, Connection>>>,
    /// Connection id to the room it is in
    placement: Arc<DashMap<ConnectionId, RoomId>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `connection` to `room`, creating the room if needed.
    ///
    /// Returns `false` if the connection was already a member. A connection
    /// placed in another room is moved out of it first.
    pub fn join(&self, room: &RoomId, connection: Connection) -> bool {
        let id = connection.id();

        let previous = self.placement.insert(id, room.clone());
        if let Some(previous) = previous.filter(|previous| previous != room) {
            self.remove_member(&previous, id);
        }

        let joined = match self.rooms.entry(room.clone()).or_default().entry(id) {
            Entry::Vacant(slot) => {
                slot.insert(connection);
                true
            }
            Entry::Occupied(_) => false,
        };

        if joined {
            debug!(%room, connection = %id, "joined");
        }
        joined
    }

    /// Removes the connection from `room`. Returns `false` if it wasn't there.
    pub fn leave(&self, room: &RoomId, id: ConnectionId) -> bool {
        let removed = self.remove_member(room, id);
        let unplaced = self.placement.remove_if(&id, |_, placed| placed == room).is_some();
        debug_assert!(
            removed == unplaced,
            "connection {id} membership and placement disagree for room {room}"
        );

        if removed {
            debug!(%room, connection = %id, "left");
        }
        removed
    }

    /// Hands `envelope` to every member of `room`.
    ///
    /// A recipient whose outbox is gone is dropped from the room and reported
    /// in the returned list; the remaining members still get the envelope.
    pub fn broadcast(&self, room: &RoomId, envelope: Envelope) -> Vec<ChatError> {
        let envelope = Arc::new(envelope);
        let mut dead = Vec::new();

        // The room entry stays locked for the whole fan-out so that
        // envelopes reach every member in publish order.
        if let Some(mut members) = self.rooms.get_mut(room) {
            members.retain(|id, connection| match connection.deliver(&envelope) {
                Ok(()) => true,
                Err(_) => {
                    self.placement.remove_if(id, |_, placed| placed == room);
                    dead.push(*id);
                    false
                }
            });

            let empty = members.is_empty();
            drop(members);
            if empty {
                self.rooms.remove_if(room, |_, members| members.is_empty());
            }
        }

        dead.into_iter()
            .map(|id| {
                let err = ChatError::DeliveryFailure(id);
                warn!(%room, envelope = %envelope.id, "{err}");
                err
            })
            .collect()
    }

    /// Connection ids currently in `room`.
    pub fn members(&self, room: &RoomId) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|members| members.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn room_of(&self, id: ConnectionId) -> Option<RoomId> {
        self.placement.get(&id).map(|room| room.clone())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn connection_count(&self) -> usize {
        self.placement.len()
    }

    fn remove_member(&self, room: &RoomId, id: ConnectionId) -> bool {
        let Some(mut members) = self.rooms.get_mut(room) else {
            return false;
        };
        let removed = members.remove(&id).is_some();
        let empty = members.is_empty();
        drop(members);

        if empty {
            self.rooms.remove_if(room, |_, members| members.is_empty());
        }
        removed
    }
}
