use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use util::state::AppState;

use crate::response::ApiResponse;

use super::common::{CourseResponse, ListQuery};
use db::models::course::{Column as CourseCol, Entity as CourseEntity, Model as Course};

/// GET `/api/courses`
///
/// Lists courses, optionally narrowed to one owner or to active courses only.
pub async fn list_courses(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> (StatusCode, Json<ApiResponse<Vec<CourseResponse>>>) {
    let db = state.db();

    let mut select = CourseEntity::find();
    if let Some(owner_id) = q.owner_id {
        select = select.filter(CourseCol::OwnerId.eq(owner_id));
    }
    if let Some(active) = q.active {
        select = select.filter(CourseCol::IsActive.eq(active));
    }

    match select.order_by_asc(CourseCol::Code).all(db).await {
        Ok(rows) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                rows.into_iter().map(CourseResponse::from).collect(),
                "Courses retrieved",
            )),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Failed to list courses: {e}"))),
        ),
    }
}

/// GET `/api/courses/{course_id}`
pub async fn get_course(
    State(state): State<AppState>,
    Path(course_id): Path<i64>,
) -> (StatusCode, Json<ApiResponse<Option<CourseResponse>>>) {
    match Course::get_by_id(state.db(), course_id).await {
        Ok(Some(course)) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                Some(CourseResponse::from(course)),
                "Course retrieved",
            )),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("course not found")),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Failed to fetch course: {e}"))),
        ),
    }
}
