use axum::{
    Json,
    body::Body,
    extract::{FromRequestParts, Path, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use db::models::course;
use std::collections::HashMap;
use util::state::AppState;

use crate::auth::claims::AuthUser;
use crate::response::ApiResponse;

#[derive(serde::Serialize, Default)]
pub struct Empty;

/// Extracts and validates the user from request parts, reinserting it into
/// the request extensions for downstream handlers.
async fn extract_and_insert_authuser(
    req: Request<Body>,
) -> Result<(Request<Body>, AuthUser), (StatusCode, Json<ApiResponse<Empty>>)> {
    let (mut parts, body) = req.into_parts();
    let user = AuthUser::from_request_parts(&mut parts, &())
        .await
        .map_err(|_| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ApiResponse::error("Authentication required")),
            )
        })?;

    let mut req = Request::from_parts(parts, body);
    req.extensions_mut().insert(user.clone());
    Ok((req, user))
}

/// Allows any authenticated principal through.
pub async fn allow_authenticated(
    req: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, Json<ApiResponse<Empty>>)> {
    let (req, _user) = extract_and_insert_authuser(req).await?;

    Ok(next.run(req).await)
}

/// Allows professors and admins through.
pub async fn allow_staff(
    req: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, Json<ApiResponse<Empty>>)> {
    let (req, user) = extract_and_insert_authuser(req).await?;

    if !user.0.is_staff() {
        return Err((
            StatusCode::FORBIDDEN,
            Json(ApiResponse::error("Staff access required")),
        ));
    }

    Ok(next.run(req).await)
}

/// Allows the owning professor of the `{course_id}` in the path, or an admin.
pub async fn require_course_owner(
    State(app_state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, Json<ApiResponse<Empty>>)> {
    let (req, user) = extract_and_insert_authuser(req).await?;

    let course_id = params
        .get("course_id")
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Missing or invalid course_id")),
        ))?;

    if user.0.is_admin() {
        return Ok(next.run(req).await);
    }

    match course::Model::get_by_id(app_state.db(), course_id).await {
        Ok(Some(course)) if course.owner_id == user.0.sub => Ok(next.run(req).await),
        Ok(Some(_)) => Err((
            StatusCode::FORBIDDEN,
            Json(ApiResponse::error("Only the course owner may do this")),
        )),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("course not found")),
        )),
        Err(_) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::error("Failed to verify ownership")),
        )),
    }
}
