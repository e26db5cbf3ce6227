use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;

use crate::AppResult;

/// 404 for a missing `what`.
pub fn sorry(what: &str) -> AppResult<Response> {
    Ok((
        StatusCode::NOT_FOUND,
        Json(json!({ "detail": format!("{what} not found") })),
    ).into_response())
}

pub fn bad_request(detail: &str) -> AppResult<Response> {
    Ok((
        StatusCode::BAD_REQUEST,
        Json(json!({ "detail": detail })),
    ).into_response())
}

pub fn unauthorized() -> AppResult<Response> {
    Ok((
        StatusCode::UNAUTHORIZED,
        Json(json!({ "detail": "login required" })),
    ).into_response())
}
