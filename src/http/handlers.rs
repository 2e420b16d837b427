//! Public API handlers.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::security::headers::{client_identifier, rate_limit_headers, reset_seconds};
use crate::security::rate_limit::{FailMode, RateLimitPreset, RateLimitResult};
use crate::security::url_validator::{validate_resolved_url, validate_url, UrlValidationResult};

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub timestamp: String,
}

pub async fn health_handler() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy",
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Optional body of a rate limit check.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRequest {
    /// Overrides the identifier derived from forwarding headers. Meant for
    /// server-side callers passing on their own client's address.
    pub identifier: Option<String>,
    /// Overrides the preset's store-failure behaviour.
    pub fail_closed: Option<bool>,
}

/// `POST /v1/rate-limit/{preset}`: count one request and report the verdict.
pub async fn check_rate_limit_handler(
    State(state): State<AppState>,
    Path(preset): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let preset: RateLimitPreset = preset.parse()?;
    let request: CheckRequest = if body.is_empty() {
        CheckRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?
    };

    let identifier = request
        .identifier
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| client_identifier(&headers));
    let fail_mode = request
        .fail_closed
        .map(FailMode::from_fail_closed)
        .unwrap_or_else(|| preset.fail_mode());

    let config = preset.config();
    let result = if state.config.load().rate_limit.enabled {
        state.limiter.check(&identifier, config, fail_mode).await
    } else {
        RateLimitResult::full_allowance(config)
    };

    tracing::debug!(
        preset = %preset,
        identifier = %identifier,
        allowed = result.allowed,
        remaining = result.remaining,
        "Rate limit checked"
    );

    Ok(rate_limit_response(result))
}

fn rate_limit_response(result: RateLimitResult) -> Response {
    let status = if result.allowed {
        StatusCode::OK
    } else {
        StatusCode::TOO_MANY_REQUESTS
    };

    let mut response = (status, rate_limit_headers(&result), Json(result)).into_response();
    if !result.allowed {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(reset_seconds(&result)));
    }
    response
}

#[derive(Debug, Default, Deserialize)]
pub struct ValidateUrlRequest {
    /// Anything other than a JSON string counts as missing.
    #[serde(default)]
    pub url: Option<serde_json::Value>,
    /// Also resolve the host and reject private addresses.
    #[serde(default)]
    pub resolve: bool,
}

/// `POST /v1/validate-url`: 200 with the verdict in the body. Only a body
/// that is not JSON at all is refused.
pub async fn validate_url_handler(body: Bytes) -> Result<Json<UrlValidationResult>, ApiError> {
    let request: ValidateUrlRequest = if body.is_empty() {
        ValidateUrlRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?
    };

    let url = match &request.url {
        Some(serde_json::Value::String(url)) => url.as_str(),
        _ => "",
    };
    let result = if request.resolve {
        validate_resolved_url(url).await
    } else {
        validate_url(url)
    };
    Ok(Json(result))
}
