use axum::{
    Router,
    middleware::from_fn,
    routing::{delete, get, post, put},
};
use util::state::AppState;

use crate::auth::guards::allow_staff;

mod common;
mod delete;
mod get;
mod post;
mod put;

pub use self::delete::withdraw_leave_request;
pub use get::{download_evidence, get_leave_request, list_leave_requests};
pub use post::{decide_leave_request, file_leave_request};
pub use put::edit_leave_request;

pub fn leave_requests_routes(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_leave_requests))
        .route("/", post(file_leave_request))
        .route("/{request_id}", get(get_leave_request))
        .route("/{request_id}", put(edit_leave_request))
        .route("/{request_id}", delete(withdraw_leave_request))
        .route(
            "/{request_id}/decision",
            post(decide_leave_request).route_layer(from_fn(allow_staff)),
        )
        .route("/{request_id}/evidence/{evidence_id}", get(download_evidence))
        .with_state(app_state)
}
