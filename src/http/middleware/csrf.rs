//! CSRF middleware.
//! Rejects mutating requests from untrusted origins before routing.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::http::server::AppState;

pub async fn csrf_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    // Guard snapshot is released before awaiting the handler.
    let rejection = state.csrf.load().protect(&request);
    match rejection {
        Some(response) => response,
        None => next.run(request).await,
    }
}
