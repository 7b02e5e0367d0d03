use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
};
use util::state::AppState;

use crate::auth::guards::{allow_staff, require_course_owner};

pub mod attendance;
mod common;
mod delete;
mod get;
mod post;
mod put;
pub mod schedule;

pub use self::delete::delete_course;
pub use get::{get_course, list_courses};
pub use post::create_course;
pub use put::edit_course;

pub fn courses_routes(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_courses))
        .route("/", post(create_course).route_layer(from_fn(allow_staff)))
        .route("/{course_id}", get(get_course))
        .route(
            "/{course_id}",
            put(edit_course)
                .route_layer(from_fn_with_state(app_state.clone(), require_course_owner)),
        )
        .route(
            "/{course_id}",
            delete(delete_course)
                .route_layer(from_fn_with_state(app_state.clone(), require_course_owner)),
        )
        .nest(
            "/{course_id}/schedule",
            schedule::schedule_routes(app_state.clone()),
        )
        .nest(
            "/{course_id}/attendance",
            attendance::attendance_routes(app_state.clone()),
        )
        .with_state(app_state)
}
