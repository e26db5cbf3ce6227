use std::fmt::Display;
use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{ws::Message, Path, State, WebSocketUpgrade},
    response::{IntoResponse, Response},
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tower_sessions::Session;
use tracing::{debug, warn};

use crate::{
    auth,
    chat::{ChatError, ChatSession, Identity, Outbox, Registry, RoomId},
    config::Config,
    db::Store,
    res, AppResult, AppState,
};

#[debug_handler(state = AppState)]
pub(crate) async fn room_ws(
    Path(room_id): Path<String>,
    State(store): State<Store>,
    State(registry): State<Registry>,
    State(config): State<Arc<Config>>,
    session: Session,

    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let Some(Admission { room, identity, store }) = admit(room_id.into(), store, &config, &session).await? else {
        return res::sorry("room");
    };

    Ok(ws
        .on_failed_upgrade(|err: axum::Error| warn!("{}", ChatError::HandshakeFailure(err.to_string())))
        .on_upgrade(move |socket| async move {
            let mut chat = ChatSession::local(room, identity, registry);
            let outbox = match chat.join() {
                Ok(outbox) => outbox,
                Err(err) => {
                    warn!(room = %chat.room(), "{err}");
                    return;
                }
            };

            let (sender, receiver) = socket.split();
            drive(chat, outbox, sender, receiver, store).await;
        })
        .into_response())
}

/// Everything a handshake settles before the socket is upgraded.
struct Admission {
    room: RoomId,
    identity: Identity,
    /// Present when inbound frames should be persisted
    store: Option<Store>,
}

/// `None` when room validation is on and `room` isn't in the store.
async fn admit(room: RoomId, store: Store, config: &Config, session: &Session) -> AppResult<Option<Admission>> {
    if config.validate_rooms && !store.room_exists(&room).await? {
        return Ok(None);
    }

    let identity = auth::identity(session)
        .await
        .map_err(|err| ChatError::HandshakeFailure(err.to_string()))?;

    Ok(Some(Admission {
        room,
        identity,
        store: config.persist_messages.then_some(store),
    }))
}

/// Pumps one joined session until the client goes away.
///
/// Room broadcasts are forwarded from `outbox` to `sink`; text frames read
/// from `stream` are published to the room. Ends on client close, stream
/// error, or a failed push, and always leaves the room on the way out.
pub async fn drive<S, R, E>(
    mut chat: ChatSession,
    mut outbox: Outbox,
    mut sink: S,
    mut stream: R,
    store: Option<Store>,
) where
    S: Sink<Message> + Unpin + Send + 'static,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let connection = chat.id();
    let mut broadcast_task = tokio::spawn(async move {
        while let Some(envelope) = outbox.recv().await {
            let frame = match serde_json::to_string(&*envelope) {
                Ok(frame) => frame,
                Err(err) => {
                    warn!(%connection, %err, "unserializable envelope");
                    continue;
                }
            };
            if sink.send(Message::Text(frame.into())).await.is_err() {
                debug!(%connection, "push failed, closing");
                break;
            }
        }
    });

    loop {
        tokio::select! {
            _ = &mut broadcast_task => break,
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => on_text(&chat, text.as_str(), store.as_ref()).await,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(err)) => {
                    debug!(%connection, %err, "websocket read failed");
                    break;
                }
            },
        }
    }

    broadcast_task.abort();
    chat.close();
}

async fn on_text(chat: &ChatSession, text: &str, store: Option<&Store>) {
    let envelope = match chat.envelope_for(text) {
        Ok(envelope) => envelope,
        Err(err) => {
            debug!(connection = %chat.id(), "dropping frame: {err}");
            return;
        }
    };

    if let Some(store) = store {
        if let Err(err) = store.insert_message(&envelope).await {
            warn!(connection = %chat.id(), envelope = %envelope.id, "not persisted: {err:#}");
        }
    }

    if let Err(err) = chat.publish(envelope) {
        debug!(connection = %chat.id(), "{err}");
    }
}
