use axum::{Json, Router, http::StatusCode, routing::get};
use serde_json::{Value, json};
use util::state::AppState;

use crate::response::ApiResponse;

/// GET `/api/health`
///
/// Liveness check; requires no authentication.
async fn health() -> (StatusCode, Json<ApiResponse<Value>>) {
    (
        StatusCode::OK,
        Json(ApiResponse::success(
            json!({ "status": "ok" }),
            "Service is healthy",
        )),
    )
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/", get(health))
}
