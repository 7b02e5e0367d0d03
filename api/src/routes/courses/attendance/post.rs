use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use util::{config, state::AppState};

use crate::auth::AuthUser;
use crate::response::ApiResponse;
use crate::routes::common::status_for;

use super::common::{
    BulkOutcomeResponse, BulkUpsertReq, IssueTokenReq, RecordViewResponse, RedeemReq,
    TokenResponse,
};
use db::checkin::{self, CheckInToken};
use db::models::attendance_record::Model as AttendanceRecord;
use db::models::course::Model as Course;

/// POST `/api/courses/{course_id}/attendance/token`
///
/// Issues a signed check-in token for one occurrence. The credential is
/// rendered as a QR payload or read out as a password; either way it dies
/// ten minutes after issuance.
///
/// **Auth**: course owner or admin (router guard).
pub async fn issue_token(
    State(state): State<AppState>,
    Path(course_id): Path<i64>,
    Json(body): Json<IssueTokenReq>,
) -> (StatusCode, Json<ApiResponse<Option<TokenResponse>>>) {
    let db = state.db();

    let Ok(Some(course)) = Course::get_by_id(db, course_id).await else {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("course not found")),
        );
    };

    let secret = config::checkin_token_secret();
    match CheckInToken::issue(db, &course, body.date, body.kind, Utc::now(), secret.as_bytes())
        .await
    {
        Ok(token) => {
            let valid_until = token.valid_until;
            (
                StatusCode::CREATED,
                Json(ApiResponse::success(
                    Some(TokenResponse { token, valid_until }),
                    "Check-in token issued",
                )),
            )
        }
        Err(e) => (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }
}

/// POST `/api/courses/{course_id}/attendance/redeem`
///
/// Redeems a token for the calling student, recording presence. Expired,
/// cancelled and unscheduled occurrences are rejected; a second redemption
/// for the same occurrence reports the earlier success.
///
/// **Auth**: any authenticated student.
pub async fn redeem_token(
    State(state): State<AppState>,
    Path(course_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(body): Json<RedeemReq>,
) -> (StatusCode, Json<ApiResponse<Option<RecordViewResponse>>>) {
    if !claims.is_student() {
        return (
            StatusCode::FORBIDDEN,
            Json(ApiResponse::error("Only students may check in")),
        );
    }
    if body.token.course_id != course_id {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Token was issued for another course")),
        );
    }

    let secret = config::checkin_token_secret();
    match checkin::redeem(state.db(), &body.token, claims.sub, Utc::now(), secret.as_bytes()).await
    {
        Ok(view) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                Some(RecordViewResponse::from(view)),
                "Attendance recorded",
            )),
        ),
        Err(e) => (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }
}

/// POST `/api/courses/{course_id}/attendance/records/bulk`
///
/// Applies one upsert per entry. Entries that fail validation or storage are
/// skipped and reported back; the rest land. This is deliberately weaker than
/// the single-record PUT, which is atomic.
///
/// **Auth**: course owner or admin (router guard).
pub async fn bulk_upsert_records(
    State(state): State<AppState>,
    Path(course_id): Path<i64>,
    Json(body): Json<BulkUpsertReq>,
) -> (StatusCode, Json<ApiResponse<Option<BulkOutcomeResponse>>>) {
    let db = state.db();

    let Ok(Some(course)) = Course::get_by_id(db, course_id).await else {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("course not found")),
        );
    };

    match AttendanceRecord::bulk_upsert(db, &course, body.date, body.entries).await {
        Ok(outcome) => {
            let applied = outcome.applied.len();
            let response = BulkOutcomeResponse {
                applied: outcome
                    .applied
                    .into_iter()
                    .map(RecordViewResponse::from)
                    .collect(),
                skipped: outcome.skipped,
            };
            (
                StatusCode::OK,
                Json(ApiResponse::success(
                    Some(response),
                    format!("{applied} attendance records processed"),
                )),
            )
        }
        Err(e) => (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }
}
