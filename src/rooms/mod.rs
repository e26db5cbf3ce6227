mod msg;
mod new;
mod room;
mod ws;

use axum::{extract::DefaultBodyLimit, routing::get, Router};

use crate::AppState;

pub use ws::drive;

pub const MAX_ROOM_NAME: usize = 255;

/// `max_upload_bytes` caps request bodies on the message endpoint, which is where images come in.
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/api/rooms/", get(new::list_rooms).post(new::create_room))
        .route("/api/rooms/{id}/", get(room::room).put(room::update_room).delete(room::delete_room))
        .route(
            "/api/messages/",
            get(msg::list_messages)
                .post(msg::send_msg)
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/ws/api/{room_id}/", get(ws::room_ws))
}

/// Trimmed room name, or the reason it can't be one.
fn room_name(raw: &str) -> Result<&str, String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err("name must not be empty".to_owned());
    }
    if name.chars().count() > MAX_ROOM_NAME {
        return Err(format!("name must be at most {MAX_ROOM_NAME} characters"));
    }
    Ok(name)
}
