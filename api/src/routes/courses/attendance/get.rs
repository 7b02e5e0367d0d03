use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use util::state::AppState;

use crate::response::ApiResponse;
use crate::routes::common::status_for;

use super::common::{RecordListQuery, RecordListResponse, RecordViewResponse};
use db::models::attendance_record::{Model as AttendanceRecord, RecordFilter, StatusTally};
use db::models::course::Model as Course;

/// GET `/api/courses/{course_id}/attendance/records`
///
/// Lists merged record views for the course with per-status tallies. `date`
/// narrows to one day; `date_from`/`date_to` give a window.
///
/// **Auth**: course owner or admin (router guard).
pub async fn list_records(
    State(state): State<AppState>,
    Path(course_id): Path<i64>,
    Query(q): Query<RecordListQuery>,
) -> (StatusCode, Json<ApiResponse<Option<RecordListResponse>>>) {
    let db = state.db();

    let Ok(Some(_course)) = Course::get_by_id(db, course_id).await else {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("course not found")),
        );
    };

    let filter = RecordFilter {
        student_id: q.student_id,
        course_id: Some(course_id),
        date_from: q.date.or(q.date_from),
        date_to: q.date.or(q.date_to),
        status: q.status,
        page: q.page.unwrap_or(1),
        per_page: q.per_page.unwrap_or(50),
    };

    match AttendanceRecord::query(db, filter).await {
        Ok(page) => {
            let stats = StatusTally::from_views(&page.views);
            let response = RecordListResponse {
                records: page
                    .views
                    .into_iter()
                    .map(RecordViewResponse::from)
                    .collect(),
                stats,
                page: page.page,
                per_page: page.per_page,
                total: page.total,
            };
            (
                StatusCode::OK,
                Json(ApiResponse::success(
                    Some(response),
                    "Attendance records retrieved",
                )),
            )
        }
        Err(e) => (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }
}
