use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::auth::guards::Empty;
use crate::response::ApiResponse;
use db::models::course::Model as Course;
use util::state::AppState;

/// DELETE `/api/courses/{course_id}`
///
/// Removes the course and, by cascade, its exceptions and records.
///
/// **Auth**: course owner or admin (router guard).
pub async fn delete_course(
    State(state): State<AppState>,
    Path(course_id): Path<i64>,
) -> (StatusCode, Json<ApiResponse<Empty>>) {
    match Course::get_by_id(state.db(), course_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error("course not found")),
            );
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(format!("Failed to fetch course: {e}"))),
            );
        }
    }

    match Course::delete(state.db(), course_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(Empty, "Course deleted")),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Failed to delete course: {e}"))),
        ),
    }
}
