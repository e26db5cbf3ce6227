use std::sync::Arc;

use tracing::{debug, info};

use super::{
    ChatError, Connection, ConnectionId, Envelope, Identity, InboundFrame, Outbox, Registry,
    RoomChannel, RoomId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Joined,
    Closed,
}

/// Protocol state of one client connection.
///
/// The session never echoes its own messages: they come back through the
/// room fan-out like everybody else's.
pub struct ChatSession {
    connection: Connection,
    outbox: Option<Outbox>,
    room: RoomId,
    registry: Registry,
    channel: Arc<dyn RoomChannel>,
    state: SessionState,
}

impl ChatSession {
    pub fn new(
        room: RoomId,
        identity: Identity,
        registry: Registry,
        channel: Arc<dyn RoomChannel>,
    ) -> Self {
        let (connection, outbox) = Connection::new(identity);
        Self {
            connection,
            outbox: Some(outbox),
            room,
            registry,
            channel,
            state: SessionState::Connecting,
        }
    }

    /// Session publishing straight into `registry`.
    pub fn local(room: RoomId, identity: Identity, registry: Registry) -> Self {
        let channel = Arc::new(registry.clone());
        Self::new(room, identity, registry, channel)
    }

    pub fn id(&self) -> ConnectionId {
        self.connection.id()
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    pub fn identity(&self) -> &Identity {
        self.connection.identity()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// `Connecting -> Joined`. Hands back the outbox the room's broadcasts arrive on.
    pub fn join(&mut self) -> Result<Outbox, ChatError> {
        if self.state != SessionState::Connecting {
            return Err(ChatError::HandshakeFailure(format!(
                "cannot join from {:?}",
                self.state
            )));
        }
        let outbox = self
            .outbox
            .take()
            .ok_or_else(|| ChatError::HandshakeFailure("outbox already taken".to_owned()))?;

        self.registry.join(&self.room, self.connection.clone());
        self.state = SessionState::Joined;
        info!(room = %self.room, connection = %self.id(), sender = self.identity().display_name(), "session joined");
        Ok(outbox)
    }

    /// Parses an inbound text frame into an envelope for this session's room.
    pub fn envelope_for(&self, text: &str) -> Result<Envelope, ChatError> {
        self.ensure_joined()?;
        let InboundFrame { message } =
            serde_json::from_str(text).map_err(ChatError::MalformedPayload)?;
        Ok(Envelope::new(self.room.clone(), self.identity(), message))
    }

    /// Sends `envelope` to everyone in the room, this session included.
    pub fn publish(&self, envelope: Envelope) -> Result<Vec<ChatError>, ChatError> {
        self.ensure_joined()?;
        Ok(self.channel.publish(&self.room, envelope))
    }

    /// Handles one inbound text frame end to end.
    pub fn receive(&self, text: &str) -> Result<Envelope, ChatError> {
        let envelope = self.envelope_for(text)?;
        self.publish(envelope.clone())?;
        Ok(envelope)
    }

    /// `Joined -> Closed`. Leaves the room the first time it is called.
    pub fn close(&mut self) -> bool {
        if self.state == SessionState::Closed {
            return false;
        }
        let was_joined = self.state == SessionState::Joined;
        self.state = SessionState::Closed;
        self.outbox = None;

        if was_joined {
            self.registry.leave(&self.room, self.id());
            info!(room = %self.room, connection = %self.id(), "session closed");
        } else {
            debug!(room = %self.room, connection = %self.id(), "session closed before joining");
        }
        was_joined
    }

    fn ensure_joined(&self) -> Result<(), ChatError> {
        match self.state {
            SessionState::Joined => Ok(()),
            state => Err(ChatError::NotJoined(state)),
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.close();
    }
}
