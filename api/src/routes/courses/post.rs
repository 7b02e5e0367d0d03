use axum::{Extension, Json, extract::State, http::StatusCode};
use validator::Validate;

use crate::auth::AuthUser;
use crate::response::ApiResponse;
use crate::routes::common::status_for;
use crate::routes::courses::common::{CourseResponse, CreateCourseReq};
use db::models::course::Model as Course;
use util::state::AppState;

/// POST `/api/courses`
///
/// Creates a course owned by the calling professor.
///
/// **Auth**: staff (router guard).
pub async fn create_course(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(body): Json<CreateCourseReq>,
) -> (StatusCode, Json<ApiResponse<Option<CourseResponse>>>) {
    if let Err(errors) = body.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(format!("Invalid course: {errors}"))),
        );
    }

    match Course::create(
        state.db(),
        claims.sub,
        &body.name,
        &body.code,
        &body.semester,
        &body.department,
        &body.days_of_week,
        body.start_time,
        body.end_time,
        body.start_date,
        body.end_date,
    )
    .await
    {
        Ok(course) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(
                Some(CourseResponse::from(course)),
                "Course created",
            )),
        ),
        Err(e) => (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }
}
