use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::response::ApiResponse;
use crate::routes::common::status_for;
use crate::routes::courses::common::{CourseResponse, UpdateCourseReq};
use db::models::course::{CourseChanges, Model as Course};
use util::state::AppState;

/// PUT `/api/courses/{course_id}`
///
/// Applies a partial update to the course.
///
/// **Auth**: course owner or admin (router guard).
pub async fn edit_course(
    State(state): State<AppState>,
    Path(course_id): Path<i64>,
    Json(body): Json<UpdateCourseReq>,
) -> (StatusCode, Json<ApiResponse<Option<CourseResponse>>>) {
    let changes = CourseChanges {
        name: body.name,
        room: body.room,
        description: body.description,
        days_of_week: body.days_of_week,
        start_time: body.start_time,
        end_time: body.end_time,
        start_date: body.start_date,
        end_date: body.end_date,
        is_active: body.is_active,
    };

    match Course::update(state.db(), course_id, changes).await {
        Ok(course) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                Some(CourseResponse::from(course)),
                "Course updated",
            )),
        ),
        Err(e) => (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }
}
