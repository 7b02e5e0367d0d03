use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};
use util::state::AppState;

use crate::auth::guards::require_course_owner;

mod common;
mod delete;
mod get;
mod post;

pub use self::delete::delete_exception;
pub use get::{get_calendar, get_occurrence, list_exceptions};
pub use post::{create_cancellation, create_makeup};

pub fn schedule_routes(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_exceptions))
        .route("/calendar", get(get_calendar))
        .route("/occurrence/{date}", get(get_occurrence))
        .route(
            "/cancellations/{date}",
            post(create_cancellation)
                .route_layer(from_fn_with_state(app_state.clone(), require_course_owner)),
        )
        .route(
            "/cancellations/{date}/makeup",
            post(create_makeup)
                .route_layer(from_fn_with_state(app_state.clone(), require_course_owner)),
        )
        .route(
            "/exceptions/{exception_id}",
            delete(delete_exception)
                .route_layer(from_fn_with_state(app_state.clone(), require_course_owner)),
        )
        .with_state(app_state)
}
