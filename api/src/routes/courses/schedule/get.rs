use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::NaiveDate;
use util::state::AppState;

use crate::response::ApiResponse;
use crate::routes::common::status_for;

use super::common::{CalendarQuery, ExceptionListQuery, ExceptionResponse, OccurrenceResponse};
use db::models::course::Model as Course;
use db::models::schedule_exception::{ExceptionFilter, Model as Exception};
use db::schedule::{self, PlannedOccurrence};

/// GET `/api/courses/{course_id}/schedule`
///
/// Lists the course's persisted exceptions, optionally narrowed by year,
/// month and kind.
pub async fn list_exceptions(
    State(state): State<AppState>,
    Path(course_id): Path<i64>,
    Query(q): Query<ExceptionListQuery>,
) -> (StatusCode, Json<ApiResponse<Vec<ExceptionResponse>>>) {
    let db = state.db();

    let Ok(Some(_course)) = Course::get_by_id(db, course_id).await else {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("course not found")),
        );
    };

    let kind = match q.kind.as_deref() {
        None => None,
        Some(raw) => match raw.parse() {
            Ok(kind) => Some(kind),
            Err(_) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse::error("kind must be cancelled or makeup")),
                );
            }
        },
    };

    let filter = ExceptionFilter {
        year: q.year,
        month: q.month,
        kind,
    };

    match Exception::list_for_course(db, course_id, filter).await {
        Ok(rows) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                rows.into_iter().map(ExceptionResponse::from).collect(),
                "Schedule exceptions retrieved",
            )),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Failed to list exceptions: {e}"))),
        ),
    }
}

/// GET `/api/courses/{course_id}/schedule/calendar?from&to&skip_weeks`
///
/// Expands the course's recurrence pattern over the window. Stored exceptions
/// are not consulted; this is the raw weekly calendar with week numbers.
pub async fn get_calendar(
    State(state): State<AppState>,
    Path(course_id): Path<i64>,
    Query(q): Query<CalendarQuery>,
) -> (StatusCode, Json<ApiResponse<Vec<PlannedOccurrence>>>) {
    let Ok(Some(course)) = Course::get_by_id(state.db(), course_id).await else {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("course not found")),
        );
    };

    if q.to < q.from {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("`to` must not precede `from`")),
        );
    }

    let planned = schedule::bulk_generate(&course, q.from, q.to, &q.skip_weeks_vec());
    (
        StatusCode::OK,
        Json(ApiResponse::success(planned, "Calendar generated")),
    )
}

/// GET `/api/courses/{course_id}/schedule/occurrence/{date}`
///
/// Resolves what `date` means for the course: a regular meeting, a
/// cancellation (with any linked makeup), a makeup, or no class at all.
pub async fn get_occurrence(
    State(state): State<AppState>,
    Path((course_id, date)): Path<(i64, NaiveDate)>,
) -> (StatusCode, Json<ApiResponse<Option<OccurrenceResponse>>>) {
    let db = state.db();

    let Ok(Some(course)) = Course::get_by_id(db, course_id).await else {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("course not found")),
        );
    };

    match schedule::resolve_occurrence(db, &course, date).await {
        Ok(occurrence) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                Some(OccurrenceResponse::build(&course, date, occurrence)),
                "Occurrence resolved",
            )),
        ),
        Err(e) => (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }
}
