use axum::{debug_handler, extract::State, http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Deserialize;
use tracing::info;

use crate::{db::{Room, Store}, res, AppResult, AppState};

use super::room_name;

#[derive(Debug, Deserialize)]
pub(crate) struct NewRoomBody {
    name: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn list_rooms(
    State(store): State<Store>,
) -> AppResult<Json<Vec<Room>>> {
    Ok(Json(store.list_rooms().await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn create_room(
    State(store): State<Store>,

    Json(NewRoomBody { name }): Json<NewRoomBody>,
) -> AppResult<Response> {
    let name = match room_name(&name) {
        Ok(name) => name,
        Err(detail) => return res::bad_request(&detail),
    };

    let room = store.create_room(name).await?;
    info!(room = room.id, name = %room.name, "room created");

    Ok((StatusCode::CREATED, Json(room)).into_response())
}

#[cfg(test)]
mod tests {
    use crate::{db::tests::memory_store, rooms::MAX_ROOM_NAME};

    use super::*;

    #[tokio::test]
    async fn create_then_list() {
        let store = memory_store().await;

        let response = create_room(State(store.clone()), Json(NewRoomBody { name: "  lobby ".to_owned() }))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let Json(rooms) = list_rooms(State(store)).await.unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].name, "lobby");
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let store = memory_store().await;
        let response = create_room(State(store.clone()), Json(NewRoomBody { name: " ".to_owned() }))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(store.list_rooms().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn overlong_name_is_rejected() {
        let store = memory_store().await;
        let response = create_room(
            State(store.clone()),
            Json(NewRoomBody { name: "a".repeat(MAX_ROOM_NAME + 1) }),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(store.list_rooms().await.unwrap().is_empty());
    }
}
