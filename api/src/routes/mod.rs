//! HTTP route entry point for `/api/...`.
//!
//! Routes are organized by domain:
//! - `/health` → liveness check (public)
//! - `/courses` → course CRUD, schedule exceptions, attendance (authenticated)
//! - `/leave-requests` → leave justification workflow (authenticated)
//! - `/me` → the calling student's own attendance views (authenticated)

use axum::{Router, middleware::from_fn};
use util::state::AppState;

use crate::auth::guards::allow_authenticated;
use crate::routes::{
    courses::courses_routes, health::health_routes, leave_requests::leave_requests_routes,
    me::me_routes,
};

pub mod common;
pub mod courses;
pub mod health;
pub mod leave_requests;
pub mod me;

/// Builds the complete application router for all HTTP endpoints.
///
/// The returned router has `AppState` as its state type and mounts all core
/// API routes under their respective base paths.
pub fn routes(app_state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/health", health_routes())
        .nest(
            "/courses",
            courses_routes(app_state.clone()).route_layer(from_fn(allow_authenticated)),
        )
        .nest(
            "/leave-requests",
            leave_requests_routes(app_state.clone()).route_layer(from_fn(allow_authenticated)),
        )
        .nest("/me", me_routes().route_layer(from_fn(allow_authenticated)))
        .with_state(app_state)
}
