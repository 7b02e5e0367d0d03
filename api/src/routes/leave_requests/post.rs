use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use chrono::NaiveDate;
use serde_json::json;
use util::notifications::Notification;
use util::state::AppState;

use crate::auth::AuthUser;
use crate::response::ApiResponse;
use crate::routes::common::status_for;

use super::common::{DecisionReq, LeaveResponse};
use db::error::DomainError;
use db::models::attendance_record::Model as AttendanceRecord;
use db::models::leave_request::{Decision, EvidenceMeta, Model as LeaveRequest};

/// POST `/api/leave-requests` (multipart)
///
/// Files a leave justification against one attendance record. Text fields:
/// `record_id`, `start_date`, `end_date`, `reason`; any number of `evidence`
/// file parts. Uploaded blobs are stored first and removed again if the
/// request itself is rejected.
///
/// **Auth**: the student who owns the record.
pub async fn file_leave_request(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    mut multipart: Multipart,
) -> (StatusCode, Json<ApiResponse<Option<LeaveResponse>>>) {
    if !claims.is_student() {
        return (
            StatusCode::FORBIDDEN,
            Json(ApiResponse::error("Only students may file leave requests")),
        );
    }

    let mut record_id: Option<i64> = None;
    let mut start_date: Option<NaiveDate> = None;
    let mut end_date: Option<NaiveDate> = None;
    let mut reason: Option<String> = None;
    let mut evidence: Vec<EvidenceMeta> = Vec::new();

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "record_id" => {
                record_id = field.text().await.ok().and_then(|v| v.parse().ok());
            }
            "start_date" => {
                start_date = field.text().await.ok().and_then(|v| v.parse().ok());
            }
            "end_date" => {
                end_date = field.text().await.ok().and_then(|v| v.parse().ok());
            }
            "reason" => {
                reason = field.text().await.ok();
            }
            "evidence" => {
                let filename = field
                    .file_name()
                    .unwrap_or("evidence")
                    .to_owned();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_owned();
                let Ok(bytes) = field.bytes().await else {
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(ApiResponse::error("Failed to read evidence upload")),
                    );
                };
                match state.evidence().store(&filename, &bytes).await {
                    Ok(handle) => evidence.push(EvidenceMeta {
                        filename,
                        handle,
                        size: bytes.len() as i64,
                        content_type,
                    }),
                    Err(e) => {
                        return (
                            StatusCode::SERVICE_UNAVAILABLE,
                            Json(ApiResponse::error(format!(
                                "Failed to store evidence: {e}"
                            ))),
                        );
                    }
                }
            }
            _ => {}
        }
    }

    let (Some(record_id), Some(start_date), Some(end_date), Some(reason)) =
        (record_id, start_date, end_date, reason)
    else {
        cleanup_blobs(&state, &evidence).await;
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(
                "record_id, start_date, end_date and reason are required",
            )),
        );
    };

    let record = match AttendanceRecord::get_by_id(state.db(), record_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            cleanup_blobs(&state, &evidence).await;
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error("attendance record not found")),
            );
        }
        Err(e) => {
            cleanup_blobs(&state, &evidence).await;
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::error(format!("Failed to load record: {e}"))),
            );
        }
    };

    match LeaveRequest::file(
        state.db(),
        claims.sub,
        &record,
        start_date,
        end_date,
        &reason,
        evidence.clone(),
    )
    .await
    {
        Ok((request, rows)) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(
                Some(LeaveResponse::from_parts(request, rows)),
                "Leave request filed",
            )),
        ),
        Err(e) => {
            cleanup_blobs(&state, &evidence).await;
            (status_for(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}

/// Removes blobs that were stored for a request that never materialized.
/// Best-effort: a failure is logged and swallowed.
async fn cleanup_blobs(state: &AppState, evidence: &[EvidenceMeta]) {
    for meta in evidence {
        if let Err(e) = state.evidence().remove(&meta.handle).await {
            tracing::warn!(handle = %meta.handle, error = %e, "evidence cleanup failed");
        }
    }
}

/// POST `/api/leave-requests/{request_id}/decision`
///
/// Applies a reviewer decision. Approving or rejecting closes the request;
/// `under_review` parks it for a closer look. An approval flips the record's
/// derived status, so the student is notified fire-and-forget.
///
/// **Auth**: staff (router guard).
pub async fn decide_leave_request(
    State(state): State<AppState>,
    Path(request_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(body): Json<DecisionReq>,
) -> (StatusCode, Json<ApiResponse<Option<LeaveResponse>>>) {
    let Ok(decision) = body.decision.parse::<Decision>() else {
        let e = DomainError::InvalidDecision;
        return (status_for(&e), Json(ApiResponse::error(e.to_string())));
    };

    match LeaveRequest::decide(
        state.db(),
        request_id,
        claims.sub,
        decision,
        body.feedback.as_deref(),
    )
    .await
    {
        Ok(request) => {
            let notification = Notification::new(
                "leave_request.decided",
                request.student_id,
                json!({
                    "request_id": request.id,
                    "record_id": request.record_id,
                    "status": request.status,
                }),
            );
            state.notifier().publish(notification).await;

            let evidence = db::models::leave_evidence::Model::list_for_request(
                state.db(),
                request.id,
            )
            .await
            .unwrap_or_default();

            (
                StatusCode::OK,
                Json(ApiResponse::success(
                    Some(LeaveResponse::from_parts(request, evidence)),
                    "Leave request decided",
                )),
            )
        }
        Err(e) => (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }
}
