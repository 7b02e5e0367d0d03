use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use util::state::AppState;

use crate::auth::AuthUser;
use crate::response::ApiResponse;
use crate::routes::common::status_for;

use super::common::{EditLeaveReq, LeaveResponse};
use db::models::leave_evidence::Model as LeaveEvidence;
use db::models::leave_request::{LeaveChanges, Model as LeaveRequest};

/// PUT `/api/leave-requests/{request_id}`
///
/// Edits a request that is still pending. Decided or in-review requests are
/// immutable to the student.
///
/// **Auth**: the filing student (admins may correct on their behalf).
pub async fn edit_leave_request(
    State(state): State<AppState>,
    Path(request_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(body): Json<EditLeaveReq>,
) -> (StatusCode, Json<ApiResponse<Option<LeaveResponse>>>) {
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

    let changes = LeaveChanges {
        start_date: body.start_date,
        end_date: body.end_date,
        reason: body.reason,
    };

    match LeaveRequest::edit(db, request_id, changes).await {
        Ok(request) => {
            let evidence = LeaveEvidence::list_for_request(db, request.id)
                .await
                .unwrap_or_default();
            (
                StatusCode::OK,
                Json(ApiResponse::success(
                    Some(LeaveResponse::from_parts(request, evidence)),
                    "Leave request updated",
                )),
            )
        }
        Err(e) => (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }
}
