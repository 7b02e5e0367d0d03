use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use util::state::AppState;

use crate::auth::AuthUser;
use crate::auth::guards::Empty;
use crate::response::ApiResponse;
use crate::routes::common::status_for;

use db::models::leave_request::Model as LeaveRequest;

/// DELETE `/api/leave-requests/{request_id}`
///
/// Withdraws a pending request. The database rows go atomically; the stored
/// evidence blobs are cleaned up best-effort afterwards, and a failure there
/// only leaves a log line, never a half-withdrawn request.
///
/// **Auth**: the filing student, or an admin.
pub async fn withdraw_leave_request(
    State(state): State<AppState>,
    Path(request_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> (StatusCode, Json<ApiResponse<Empty>>) {
    let db = state.db();

    match LeaveRequest::get_by_id(db, request_id).await {
        Ok(Some(request)) => {
            if !claims.is_admin() && request.student_id != claims.sub {
                return (
                    StatusCode::FORBIDDEN,
                    Json(ApiResponse::error("Not your leave request")),
                );
            }
        }
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error("leave request not found")),
            );
        }
        Err(e) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::error(format!(
                    "Failed to fetch leave request: {e}"
                ))),
            );
        }
    }

    match LeaveRequest::withdraw(db, request_id).await {
        Ok(handles) => {
            for handle in handles {
                if let Err(e) = state.evidence().remove(&handle).await {
                    tracing::warn!(%handle, error = %e, "evidence cleanup failed on withdrawal");
                }
            }
            (
                StatusCode::OK,
                Json(ApiResponse::success(Empty, "Leave request withdrawn")),
            )
        }
        Err(e) => (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }
}
