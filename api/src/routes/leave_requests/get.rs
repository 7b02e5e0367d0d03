use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use util::state::AppState;

use crate::auth::AuthUser;
use crate::response::ApiResponse;

use super::common::{LeaveListQuery, LeaveResponse};
use db::models::leave_evidence::Model as LeaveEvidence;
use db::models::leave_request::{LeaveFilter, Model as LeaveRequest};

/// GET `/api/leave-requests`
///
/// Staff see every request, filtered at will; a student is always pinned to
/// their own.
pub async fn list_leave_requests(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Query(q): Query<LeaveListQuery>,
) -> (StatusCode, Json<ApiResponse<Vec<LeaveResponse>>>) {
    let db = state.db();

    let status = match q.status.as_deref() {
        None => None,
        Some(raw) => match raw.parse() {
            Ok(status) => Some(status),
            Err(_) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse::error("Unknown leave status filter")),
                );
            }
        },
    };

    let filter = LeaveFilter {
        student_id: if claims.is_staff() {
            q.student_id
        } else {
            Some(claims.sub)
        },
        course_id: q.course_id,
        status,
        from: q.from,
        to: q.to,
    };

    match LeaveRequest::list(db, filter).await {
        Ok(requests) => {
            let mut responses = Vec::with_capacity(requests.len());
            for request in requests {
                let evidence = LeaveEvidence::list_for_request(db, request.id)
                    .await
                    .unwrap_or_default();
                responses.push(LeaveResponse::from_parts(request, evidence));
            }
            (
                StatusCode::OK,
                Json(ApiResponse::success(responses, "Leave requests retrieved")),
            )
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!(
                "Failed to list leave requests: {e}"
            ))),
        ),
    }
}

/// GET `/api/leave-requests/{request_id}`
pub async fn get_leave_request(
    State(state): State<AppState>,
    Path(request_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> (StatusCode, Json<ApiResponse<Option<LeaveResponse>>>) {
    let db = state.db();

    match LeaveRequest::get_by_id(db, request_id).await {
        Ok(Some(request)) => {
            if !claims.is_staff() && request.student_id != claims.sub {
                return (
                    StatusCode::FORBIDDEN,
                    Json(ApiResponse::error("Not your leave request")),
                );
            }
            let evidence = LeaveEvidence::list_for_request(db, request.id)
                .await
                .unwrap_or_default();
            (
                StatusCode::OK,
                Json(ApiResponse::success(
                    Some(LeaveResponse::from_parts(request, evidence)),
                    "Leave request retrieved",
                )),
            )
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("leave request not found")),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!(
                "Failed to fetch leave request: {e}"
            ))),
        ),
    }
}

/// GET `/api/leave-requests/{request_id}/evidence/{evidence_id}`
///
/// Streams one stored evidence file back through the blob store.
pub async fn download_evidence(
    State(state): State<AppState>,
    Path((request_id, evidence_id)): Path<(i64, i64)>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> axum::response::Response {
    let db = state.db();

    let request = match LeaveRequest::get_by_id(db, request_id).await {
        Ok(Some(request)) => request,
        _ => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<()>::error("leave request not found")),
            )
                .into_response();
        }
    };
    if !claims.is_staff() && request.student_id != claims.sub {
        return (
            StatusCode::FORBIDDEN,
            Json(ApiResponse::<()>::error("Not your leave request")),
        )
            .into_response();
    }

    let evidence = match LeaveEvidence::list_for_request(db, request.id).await {
        Ok(rows) => rows.into_iter().find(|e| e.id == evidence_id),
        Err(_) => None,
    };
    let Some(evidence) = evidence else {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::error("evidence not found")),
        )
            .into_response();
    };

    match state.evidence().fetch(&evidence.handle).await {
        Ok(bytes) => {
            let mut headers = HeaderMap::new();
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_str(&evidence.content_type)
                    .unwrap_or(HeaderValue::from_static("application/octet-stream")),
            );
            let disposition = format!("attachment; filename=\"{}\"", evidence.filename);
            headers.insert(
                header::CONTENT_DISPOSITION,
                HeaderValue::from_str(&disposition)
                    .unwrap_or(HeaderValue::from_static("attachment")),
            );
            (StatusCode::OK, headers, bytes).into_response()
        }
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::error(format!(
                "Evidence file unavailable: {e}"
            ))),
        )
            .into_response(),
    }
}
