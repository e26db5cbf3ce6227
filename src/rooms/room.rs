use axum::{debug_handler, extract::{Path, State}, http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Deserialize;
use tracing::info;

use crate::{db::Store, res, AppResult, AppState};

use super::room_name;

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateRoomBody {
    name: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn room(
    State(store): State<Store>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let Ok(id) = id.parse() else {
        return res::sorry("room");
    };
    let Some(room) = store.get_room(id).await? else {
        return res::sorry("room");
    };
    Ok(Json(room).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn update_room(
    State(store): State<Store>,
    Path(id): Path<String>,

    Json(UpdateRoomBody { name }): Json<UpdateRoomBody>,
) -> AppResult<Response> {
    let Ok(id) = id.parse() else {
        return res::sorry("room");
    };
    let room = match name.as_deref().map(room_name) {
        Some(Err(detail)) => return res::bad_request(&detail),
        Some(Ok(name)) => store.rename_room(id, name).await?,
        None => store.get_room(id).await?,
    };

    match room {
        Some(room) => Ok(Json(room).into_response()),
        None => res::sorry("room"),
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete_room(
    State(store): State<Store>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let Ok(id) = id.parse::<i64>() else {
        return res::sorry("room");
    };
    if !store.delete_room(id).await? {
        return res::sorry("room");
    }
    info!(room = id, "room deleted");
    Ok(StatusCode::NO_CONTENT.into_response())
}
