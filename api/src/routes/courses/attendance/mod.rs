use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post, put},
};
use util::state::AppState;

use crate::auth::guards::require_course_owner;

pub mod common;
mod get;
mod post;
mod put;

pub use get::list_records;
pub use post::{bulk_upsert_records, issue_token, redeem_token};
pub use put::upsert_record;

pub fn attendance_routes(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/token",
            post(issue_token)
                .route_layer(from_fn_with_state(app_state.clone(), require_course_owner)),
        )
        .route("/redeem", post(redeem_token))
        .route(
            "/records",
            get(list_records)
                .route_layer(from_fn_with_state(app_state.clone(), require_course_owner)),
        )
        .route(
            "/records",
            put(upsert_record)
                .route_layer(from_fn_with_state(app_state.clone(), require_course_owner)),
        )
        .route(
            "/records/bulk",
            post(bulk_upsert_records)
                .route_layer(from_fn_with_state(app_state.clone(), require_course_owner)),
        )
        .with_state(app_state)
}
