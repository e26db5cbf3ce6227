pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod media;
pub mod res;
pub mod rooms;
pub mod session;

use std::sync::Arc;

use axum::{extract::FromRef, http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;

use chat::Registry;
use config::Config;
use db::Store;
use media::{Media, MediaError};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub store: Store,
    pub registry: Registry,
    pub media: Media,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Store, config: Config) -> Self {
        Self {
            store,
            registry: Registry::new(),
            media: Media::from_config(&config),
            config: Arc::new(config),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Handler failure. Rendered as `{"detail": ...}` like every other error body.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    fn status(&self) -> StatusCode {
        match self.0.downcast_ref::<MediaError>() {
            Some(MediaError::Unsupported | MediaError::Empty) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self.0, "request failed");
        }
        (status, Json(json!({ "detail": format!("{:#}", self.0) }))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
