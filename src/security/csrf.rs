//! Origin-based CSRF guard for mutating requests.

use axum::{
    http::{header, HeaderMap, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use url::Url;

use crate::config::CsrfConfig;
use crate::observability::metrics;

/// Body message returned with every CSRF rejection.
pub const CSRF_ERROR_MESSAGE: &str = "Invalid request origin";

/// Why a request failed the origin check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsrfRejection {
    /// `Origin` header not in the allow-list.
    DisallowedOrigin(String),
    /// `Origin` header present but not readable as text.
    MalformedOrigin,
    /// `Referer` origin not in the allow-list.
    DisallowedReferer(String),
    /// `Referer` could not be parsed as a URL.
    MalformedReferer(String),
}

/// Allow-list of application origins.
#[derive(Debug, Clone, Default)]
pub struct CsrfGuard {
    enabled: bool,
    allowed_origins: Vec<String>,
    preview_suffix: Option<String>,
}

impl CsrfGuard {
    pub fn new(allowed_origins: Vec<String>, preview_suffix: Option<String>) -> Self {
        Self {
            enabled: true,
            allowed_origins,
            preview_suffix: preview_suffix.filter(|s| !s.is_empty()),
        }
    }

    pub fn from_config(config: &CsrfConfig) -> Self {
        Self {
            enabled: config.enabled,
            ..Self::new(config.allowed_origins.clone(), Some(config.preview_suffix.clone()))
        }
    }

    /// Whether `origin` (scheme://host[:port]) is trusted.
    pub fn is_allowed_origin(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|o| o == origin)
            || self
                .preview_suffix
                .as_deref()
                .is_some_and(|suffix| origin.ends_with(suffix))
    }

    /// Check a request by method and headers.
    ///
    /// `Origin` wins over `Referer`. A header that is present but not valid
    /// text is rejected, never treated as absent.
    pub fn check(&self, method: &Method, headers: &HeaderMap) -> Result<(), CsrfRejection> {
        if !self.enabled || !is_mutating(method) {
            return Ok(());
        }

        if let Some(origin) = headers.get(header::ORIGIN) {
            let origin = origin.to_str().map_err(|_| CsrfRejection::MalformedOrigin)?;
            return if self.is_allowed_origin(origin) {
                Ok(())
            } else {
                Err(CsrfRejection::DisallowedOrigin(origin.to_string()))
            };
        }

        if let Some(referer) = headers.get(header::REFERER) {
            let malformed =
                || CsrfRejection::MalformedReferer(String::from_utf8_lossy(referer.as_bytes()).into_owned());
            let referer = referer.to_str().map_err(|_| malformed())?;
            let referer_origin = Url::parse(referer)
                .map_err(|_| malformed())?
                .origin()
                .ascii_serialization();
            return if self.is_allowed_origin(&referer_origin) {
                Ok(())
            } else {
                Err(CsrfRejection::DisallowedReferer(referer_origin))
            };
        }

        tracing::debug!(method = %method, "Mutating request without Origin or Referer allowed");
        Ok(())
    }

    /// `None` when the request may proceed, otherwise a 403 response.
    pub fn protect<B>(&self, request: &Request<B>) -> Option<Response> {
        let rejection = self.check(request.method(), request.headers()).err()?;

        let headers = request.headers();
        tracing::warn!(
            origin = ?headers.get("origin"),
            referer = ?headers.get("referer"),
            url = %request.uri(),
            reason = ?rejection,
            "CSRF check rejected request"
        );
        metrics::record_csrf_rejection();

        Some(forbidden())
    }
}

fn is_mutating(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE)
}

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(serde_json::json!({ "error": CSRF_ERROR_MESSAGE })),
    )
        .into_response()
}
