use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::security::store::RateLimitRecord;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub rate_limit_enabled: bool,
    pub csrf_enabled: bool,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let config = state.config.load();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        rate_limit_enabled: config.rate_limit.enabled,
        csrf_enabled: config.csrf.enabled,
    })
}

/// Live counters, sorted by key. Expired windows not yet swept are included.
pub async fn list_rate_limits(
    State(state): State<AppState>,
) -> Result<Json<Vec<RateLimitRecord>>, ApiError> {
    let mut records = state.store().list().await?;
    records.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(Json(records))
}

/// Drop one counter, giving that client a fresh window.
pub async fn delete_rate_limit(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<StatusCode, ApiError> {
    let removed = state
        .store()
        .delete_where(&|r: &RateLimitRecord| r.key == key)
        .await?;

    if removed == 0 {
        return Err(ApiError::RecordNotFound(key));
    }
    tracing::info!(key = %key, "Rate limit record reset by admin");
    Ok(StatusCode::NO_CONTENT)
}
