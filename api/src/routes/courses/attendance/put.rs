use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use util::state::AppState;

use crate::response::ApiResponse;
use crate::routes::common::status_for;

use super::common::{RecordViewResponse, UpsertRecordReq};
use db::models::attendance_detail::CheckMethod;
use db::models::attendance_record::Model as AttendanceRecord;
use db::models::course::Model as Course;

/// PUT `/api/courses/{course_id}/attendance/records`
///
/// Creates or updates one student's record for a date. The raw status is
/// replaced, `requires_justification` recomputed, and the write is atomic.
///
/// **Auth**: course owner or admin (router guard).
pub async fn upsert_record(
    State(state): State<AppState>,
    Path(course_id): Path<i64>,
    Json(body): Json<UpsertRecordReq>,
) -> (StatusCode, Json<ApiResponse<Option<RecordViewResponse>>>) {
    let db = state.db();

    let Ok(Some(course)) = Course::get_by_id(db, course_id).await else {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("course not found")),
        );
    };

    match AttendanceRecord::upsert(
        db,
        body.student_id,
        &course,
        body.date,
        body.status,
        body.method.unwrap_or(CheckMethod::Manual),
        body.notes.as_deref(),
    )
    .await
    {
        Ok(view) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                Some(RecordViewResponse::from(view)),
                "Attendance record saved",
            )),
        ),
        Err(e) => (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }
}
