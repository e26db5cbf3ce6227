use std::sync::Arc;

use axum::{
    body::Bytes,
    debug_handler,
    extract::{multipart::MultipartError, FromRequest, Multipart, Query, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{
    auth,
    chat::{Envelope, Identity, Registry, RoomChannel, RoomId},
    config::Config,
    db::Store,
    media::Media,
    res, AppResult, AppState,
};

#[derive(Deserialize)]
pub(crate) struct MessagesQuery {
    room: Option<RoomId>,
}

#[derive(Deserialize)]
pub(crate) struct SendMessageBody {
    room_id: RoomId,
    #[serde(alias = "message")]
    content: String,
}

/// A new message, either as JSON or as a multipart upload carrying an image.
pub(crate) enum SendMessageForm {
    Json(SendMessageBody),
    Multipart(Multipart),
}

impl<S: Send + Sync> FromRequest<S> for SendMessageForm {
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        if is_multipart {
            Multipart::from_request(req, state)
                .await
                .map(Self::Multipart)
                .map_err(IntoResponse::into_response)
        } else {
            Json::from_request(req, state)
                .await
                .map(|Json(body)| Self::Json(body))
                .map_err(IntoResponse::into_response)
        }
    }
}

#[derive(Default)]
struct Upload {
    room_id: Option<RoomId>,
    content: Option<String>,
    image: Option<ImagePart>,
}

struct ImagePart {
    content_type: Option<String>,
    file_name: Option<String>,
    bytes: Bytes,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, MultipartError> {
    let mut upload = Upload::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("room" | "room_id") => upload.room_id = Some(RoomId::from(field.text().await?.trim())),
            Some("content" | "message") => upload.content = Some(field.text().await?),
            Some("image") => {
                let content_type = field.content_type().map(str::to_owned);
                let file_name = field.file_name().map(str::to_owned);
                upload.image = Some(ImagePart {
                    content_type,
                    file_name,
                    bytes: field.bytes().await?,
                });
            }
            _ => {}
        }
    }
    Ok(upload)
}

/// History of one room, newest first. Without `?room=` there is nothing to list.
#[debug_handler(state = AppState)]
pub(crate) async fn list_messages(
    State(store): State<Store>,
    Query(MessagesQuery { room }): Query<MessagesQuery>,
) -> AppResult<Json<Vec<Envelope>>> {
    let Some(room) = room else {
        return Ok(Json(Vec::new()));
    };
    Ok(Json(store.list_messages(&room).await?))
}

/// Stores a message and pushes it to everyone in the room, same as a websocket frame would.
#[debug_handler(state = AppState)]
pub(crate) async fn send_msg(
    State(store): State<Store>,
    State(registry): State<Registry>,
    State(media): State<Media>,
    State(config): State<Arc<Config>>,
    session: Session,

    form: SendMessageForm,
) -> AppResult<Response> {
    let identity = auth::identity(&session).await?;
    if identity == Identity::Anonymous {
        return res::unauthorized();
    }

    let (room_id, content, image) = match form {
        SendMessageForm::Json(SendMessageBody { room_id, content }) => (room_id, content, None),
        SendMessageForm::Multipart(multipart) => {
            let upload = match read_upload(multipart).await {
                Ok(upload) => upload,
                Err(err) => return Ok(err.into_response()),
            };
            let Some(room_id) = upload.room_id else {
                return res::bad_request("room is required");
            };
            (room_id, upload.content.unwrap_or_default(), upload.image)
        }
    };

    if content.trim().is_empty() && image.is_none() {
        return res::bad_request("message needs content or an image");
    }
    if config.validate_rooms && !store.room_exists(&room_id).await? {
        return res::sorry("room");
    }

    let mut envelope = Envelope::new(room_id, &identity, content);
    if let Some(ImagePart { content_type, file_name, bytes }) = image {
        let url = media
            .save_image(content_type.as_deref(), file_name.as_deref(), &bytes)
            .await?;
        envelope = envelope.with_image(url);
    }

    store.insert_message(&envelope).await?;
    registry.publish(&envelope.room_id, envelope.clone());

    Ok((StatusCode::CREATED, Json(envelope)).into_response())
}
