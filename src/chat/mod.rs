//! Room-based broadcast core.
//!
//! Connections join a room through the [`Registry`], sessions publish
//! [`Envelope`]s through a [`RoomChannel`], and every member of the room
//! (the sender included) receives each envelope on its [`Outbox`].

mod channel;
mod registry;
mod session;

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

pub use channel::RoomChannel;
pub use registry::{Connection, Outbox, Registry};
pub use session::{ChatSession, SessionState};

pub const ANONYMOUS: &str = "Anonymous";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RoomId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Clients address rooms by their numeric primary key as often as by string.
impl<'de> Deserialize<'de> for RoomId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(id) => Self(id),
            Raw::Number(id) => Self(id.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Who is on the other end of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Authenticated { name: String },
    Anonymous,
}

impl Identity {
    /// Maps the identity provider's `username | null` onto a variant.
    pub fn from_username(username: Option<String>) -> Self {
        match username {
            Some(name) if !name.trim().is_empty() => Identity::Authenticated { name },
            _ => Identity::Anonymous,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Identity::Authenticated { name } => name,
            Identity::Anonymous => ANONYMOUS,
        }
    }
}

/// One chat message as it travels through a room, and as it goes out on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: Uuid,
    pub message: String,
    pub sender: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub room_id: RoomId,
    /// URL of an attached image; only uploads over HTTP carry one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Envelope {
    pub fn new(room_id: RoomId, identity: &Identity, message: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            message,
            sender: identity.display_name().to_owned(),
            timestamp: OffsetDateTime::now_utc(),
            room_id,
            image: None,
        }
    }

    pub fn with_image(mut self, url: String) -> Self {
        self.image = Some(url);
        self
    }
}

/// Inbound client frame. Anything besides `message` is ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct InboundFrame {
    pub(crate) message: String,
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("handshake failed: {0}")]
    HandshakeFailure(String),
    #[error("malformed payload: {0}")]
    MalformedPayload(#[source] serde_json::Error),
    #[error("delivery to connection {0} failed: receiver closed")]
    DeliveryFailure(ConnectionId),
    #[error("session is {0:?}, not joined")]
    NotJoined(SessionState),
}
