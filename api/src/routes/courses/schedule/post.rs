use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::NaiveDate;
use util::state::AppState;

use crate::response::ApiResponse;
use crate::routes::common::status_for;

use super::common::{CancellationReq, ExceptionResponse, MakeupReq};
use db::models::course::Model as Course;
use db::schedule;

/// POST `/api/courses/{course_id}/schedule/cancellations/{date}`
///
/// Cancels the meeting on `date`.
///
/// **Auth**: course owner or admin (router guard).
pub async fn create_cancellation(
    State(state): State<AppState>,
    Path((course_id, date)): Path<(i64, NaiveDate)>,
    Json(body): Json<CancellationReq>,
) -> (StatusCode, Json<ApiResponse<Option<ExceptionResponse>>>) {
    let db = state.db();

    let Ok(Some(course)) = Course::get_by_id(db, course_id).await else {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("course not found")),
        );
    };

    match schedule::create_cancellation(
        db,
        &course,
        date,
        body.reason.as_deref(),
        body.notes.as_deref(),
    )
    .await
    {
        Ok(exception) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(
                Some(ExceptionResponse::from(exception)),
                "Class cancelled",
            )),
        ),
        Err(e) => (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }
}

/// POST `/api/courses/{course_id}/schedule/cancellations/{date}/makeup`
///
/// Schedules a makeup class for the cancellation on `date`.
///
/// **Auth**: course owner or admin (router guard).
pub async fn create_makeup(
    State(state): State<AppState>,
    Path((course_id, date)): Path<(i64, NaiveDate)>,
    Json(body): Json<MakeupReq>,
) -> (StatusCode, Json<ApiResponse<Option<ExceptionResponse>>>) {
    let db = state.db();

    let Ok(Some(course)) = Course::get_by_id(db, course_id).await else {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("course not found")),
        );
    };

    match schedule::create_makeup(
        db,
        &course,
        body.date,
        date,
        body.start_time,
        body.end_time,
        body.reason.as_deref(),
        body.notes.as_deref(),
    )
    .await
    {
        Ok(exception) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(
                Some(ExceptionResponse::from(exception)),
                "Makeup class scheduled",
            )),
        ),
        Err(e) => (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }
}
