//! Error responses for the HTTP API.
//!
//! Every error body is `{"error": "<message>"}`. Store failures are logged in
//! full and reported to the client with a fixed message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::security::rate_limit::UnknownPreset;
use crate::security::store::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    UnknownPreset(#[from] UnknownPreset),

    #[error("Invalid request body: {0}")]
    BadRequest(String),

    #[error("Rate limit record '{0}' not found")]
    RecordNotFound(String),

    #[error("Storage unavailable")]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::UnknownPreset(_) | ApiError::RecordNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Store(e) = &self {
            tracing::error!(error = %e, "Store operation failed");
        }
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::UnknownPreset(UnknownPreset("x".into())).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::BadRequest("eof".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::Store(StoreError::Unavailable("down".into())).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_store_error_message_is_fixed() {
        let err = ApiError::Store(StoreError::Unavailable("10.0.0.5:6379 refused".into()));
        assert_eq!(err.to_string(), "Storage unavailable");
    }
}
