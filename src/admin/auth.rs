use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::http::server::AppState;

/// Require `Authorization: Bearer <admin.api_key>`. The key is read per
/// request so a reloaded config takes effect immediately.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let authorized = {
        let config = state.config.load();
        request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| key_matches(token, &config.admin.api_key))
    };

    if authorized {
        Ok(next.run(request).await)
    } else {
        tracing::warn!(path = %request.uri().path(), "Rejected admin request");
        Err(StatusCode::UNAUTHORIZED)
    }
}

/// Constant-time for equal-length inputs. An empty configured key never matches.
fn key_matches(token: &str, api_key: &str) -> bool {
    !api_key.is_empty() && bool::from(token.as_bytes().ct_eq(api_key.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_matches() {
        assert!(key_matches("s3cret-admin-key", "s3cret-admin-key"));
        assert!(!key_matches("s3cret-admin-kez", "s3cret-admin-key"));
        assert!(!key_matches("s3cret", "s3cret-admin-key"));
        assert!(!key_matches("", ""));
    }
}
