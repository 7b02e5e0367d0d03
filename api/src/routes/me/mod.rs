use axum::{Router, routing::get};
use util::state::AppState;

mod get;

pub use self::get::my_attendance;

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/attendance", get(my_attendance))
}
