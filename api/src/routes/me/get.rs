use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use util::state::AppState;

use crate::auth::AuthUser;
use crate::response::ApiResponse;
use crate::routes::common::status_for;
use crate::routes::courses::attendance::common::{RecordListResponse, RecordViewResponse};
use db::models::attendance_record::{Model as AttendanceRecord, RecordFilter, StatusTally};

#[derive(Debug, Deserialize)]
pub struct MyAttendanceQuery {
    pub course_id: Option<i64>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// GET `/api/me/attendance?course_id`
///
/// The calling student's own merged attendance views with tallies. A student
/// can only ever see their own records here; staff use the course listing.
pub async fn my_attendance(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Query(q): Query<MyAttendanceQuery>,
) -> (StatusCode, Json<ApiResponse<Option<RecordListResponse>>>) {
    let filter = RecordFilter {
        student_id: Some(claims.sub),
        course_id: q.course_id,
        page: q.page.unwrap_or(1),
        per_page: q.per_page.unwrap_or(50),
        ..Default::default()
    };

    match AttendanceRecord::query(state.db(), filter).await {
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
                    "Attendance retrieved",
                )),
            )
        }
        Err(e) => (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }
}
