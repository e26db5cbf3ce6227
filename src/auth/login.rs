use axum::{debug_handler, Json};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::info;

use crate::{session::USER_NAME, AppResult};

use super::random_alias;

/// Credentials are not checked here; any extra fields (e.g. `password`) are ignored.
#[derive(Deserialize)]
pub(crate) struct LoginBody {
    pub(crate) username: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginResponse {
    message: &'static str,
    username: String,
}

#[debug_handler]
pub(crate) async fn login(
    session: Session,
    Json(LoginBody { username }): Json<LoginBody>,
) -> AppResult<Json<LoginResponse>> {
    let username = username
        .map(|username| username.trim().to_owned())
        .filter(|username| !username.is_empty())
        .unwrap_or_else(random_alias);

    session.cycle_id().await?;
    session.insert(USER_NAME, &username).await?;
    info!(%username, "login");

    Ok(Json(LoginResponse {
        message: "Login successful",
        username,
    }))
}
