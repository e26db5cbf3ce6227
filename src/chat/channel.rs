use super::{ChatError, Envelope, Registry, RoomId};

/// Addressable topic per room. Sessions publish through this trait so the
/// in-process [`Registry`] can be swapped for another transport.
pub trait RoomChannel: Send + Sync {
    /// Fans `envelope` out to the room. Per-recipient failures are returned, never raised.
    fn publish(&self, room: &RoomId, envelope: Envelope) -> Vec<ChatError>;
}

impl RoomChannel for Registry {
    fn publish(&self, room: &RoomId, envelope: Envelope) -> Vec<ChatError> {
        self.broadcast(room, envelope)
    }
}
