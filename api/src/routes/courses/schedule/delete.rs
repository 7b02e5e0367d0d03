use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use util::state::AppState;

use crate::auth::guards::Empty;
use crate::response::ApiResponse;
use crate::routes::common::status_for;
use db::schedule;

/// DELETE `/api/courses/{course_id}/schedule/exceptions/{exception_id}`
///
/// Removes a cancellation or makeup. A cancellation with a linked makeup and
/// any occurrence referenced by attendance records are protected.
///
/// **Auth**: course owner or admin (router guard).
pub async fn delete_exception(
    State(state): State<AppState>,
    Path((_course_id, exception_id)): Path<(i64, i64)>,
) -> (StatusCode, Json<ApiResponse<Empty>>) {
    match schedule::delete_exception(state.db(), exception_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(Empty, "Schedule exception deleted")),
        ),
        Err(e) => (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }
}
