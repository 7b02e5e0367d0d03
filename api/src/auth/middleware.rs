use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{Method, Request},
    middleware::Next,
    response::Response,
};
use tracing::info;

use crate::auth::claims::AuthUser;

/// Logs method, path and user ID (if authenticated) for each incoming HTTP
/// request. Skips CORS preflight `OPTIONS` requests.
pub async fn log_request(req: Request<Body>, next: Next) -> Response {
    let (mut parts, body) = req.into_parts();

    if parts.method == Method::OPTIONS {
        let req = Request::from_parts(parts, body);
        return next.run(req).await;
    }

    let user_id = AuthUser::from_request_parts(&mut parts, &())
        .await
        .ok()
        .map(|AuthUser(c)| c.sub)
        .unwrap_or(0);

    info!(
        method = %parts.method,
        path = %parts.uri.path(),
        user = user_id,
        "request"
    );

    let req = Request::from_parts(parts, body);
    next.run(req).await
}
