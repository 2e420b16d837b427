//! Fixed-window rate limiting over a shared store.
//!
//! Each check is one read and one write against a [`RateLimitStore`], so the
//! limit holds across any number of stateless instances sharing that store.
//! Expired windows are swept lazily at the start of every check.
//!
//! Two concurrent checks for the same key can both read `count = N` and both
//! write `N + 1`. This under-counts slightly and is accepted for abuse
//! prevention; it is not a hard quota.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::observability::metrics;
use crate::security::store::{RateLimitRecord, RateLimitStore, StoreResult};

/// Limit parameters for one named operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Ceiling per window.
    pub max_requests: u32,
    /// Window length in milliseconds.
    pub window_ms: u64,
    /// Namespace keeping unrelated operations on separate counters.
    pub prefix: Cow<'static, str>,
}

impl RateLimitConfig {
    pub const fn new(max_requests: u32, window_ms: u64, prefix: &'static str) -> Self {
        Self {
            max_requests,
            window_ms,
            prefix: Cow::Borrowed(prefix),
        }
    }

    /// Counter key for `identifier` under this config.
    pub fn key_for(&self, identifier: &str) -> String {
        if self.prefix.is_empty() {
            identifier.to_string()
        } else {
            format!("{}:{}", self.prefix, identifier)
        }
    }

    fn window(&self) -> Duration {
        Duration::milliseconds(i64::try_from(self.window_ms).unwrap_or(i64::MAX))
    }
}

/// PDF generation: 10 per hour.
pub static PDF_GENERATION: RateLimitConfig = RateLimitConfig::new(10, 3_600_000, "pdf-gen");
/// Share-link redirect lookups: 60 per minute.
pub static SHARE_LINK: RateLimitConfig = RateLimitConfig::new(60, 60_000, "share-link");
/// AI generation endpoints: 10 per hour.
pub static AI_GENERATION: RateLimitConfig = RateLimitConfig::new(10, 3_600_000, "ai-gen");
/// Motivation-letter PDF generation: 10 per hour.
pub static MOTIVATION_PDF: RateLimitConfig = RateLimitConfig::new(10, 3_600_000, "motivation-pdf");

/// What a check returns when the store fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailMode {
    /// Allow the request with the full allowance.
    #[default]
    Open,
    /// Deny the request.
    Closed,
}

impl FailMode {
    pub fn from_fail_closed(fail_closed: bool) -> Self {
        if fail_closed {
            FailMode::Closed
        } else {
            FailMode::Open
        }
    }
}

/// The named operations with a pre-defined limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitPreset {
    PdfGeneration,
    ShareLink,
    AiGeneration,
    MotivationPdf,
}

impl RateLimitPreset {
    pub const ALL: [RateLimitPreset; 4] = [
        RateLimitPreset::PdfGeneration,
        RateLimitPreset::ShareLink,
        RateLimitPreset::AiGeneration,
        RateLimitPreset::MotivationPdf,
    ];

    pub fn config(&self) -> &'static RateLimitConfig {
        match self {
            RateLimitPreset::PdfGeneration => &PDF_GENERATION,
            RateLimitPreset::ShareLink => &SHARE_LINK,
            RateLimitPreset::AiGeneration => &AI_GENERATION,
            RateLimitPreset::MotivationPdf => &MOTIVATION_PDF,
        }
    }

    /// Default store-failure behaviour for the preset.
    ///
    /// PDF limits only cap rendering cost and fail open. Share links and AI
    /// generation guard against enumeration and paid upstream usage, so an
    /// unreachable store denies instead.
    pub fn fail_mode(&self) -> FailMode {
        match self {
            RateLimitPreset::PdfGeneration | RateLimitPreset::MotivationPdf => FailMode::Open,
            RateLimitPreset::ShareLink | RateLimitPreset::AiGeneration => FailMode::Closed,
        }
    }

    /// URL-facing name; identical to the counter prefix.
    pub fn slug(&self) -> &'static str {
        match self {
            RateLimitPreset::PdfGeneration => "pdf-gen",
            RateLimitPreset::ShareLink => "share-link",
            RateLimitPreset::AiGeneration => "ai-gen",
            RateLimitPreset::MotivationPdf => "motivation-pdf",
        }
    }
}

impl fmt::Display for RateLimitPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Unknown preset name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown rate limit preset '{0}'")]
pub struct UnknownPreset(pub String);

impl FromStr for RateLimitPreset {
    type Err = UnknownPreset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RateLimitPreset::ALL
            .into_iter()
            .find(|p| p.slug() == s)
            .ok_or_else(|| UnknownPreset(s.to_string()))
    }
}

/// Outcome of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitResult {
    pub allowed: bool,
    /// Requests left in the current window.
    pub remaining: u32,
    /// Milliseconds until the window expires.
    pub reset_in: u64,
    /// Echo of `max_requests`.
    pub limit: u32,
}

impl RateLimitResult {
    /// Allowed, nothing consumed, a whole window ahead.
    pub fn full_allowance(config: &RateLimitConfig) -> Self {
        Self {
            allowed: true,
            remaining: config.max_requests,
            reset_in: config.window_ms,
            limit: config.max_requests,
        }
    }

    /// Denied for a whole window.
    pub fn denied(config: &RateLimitConfig) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            reset_in: config.window_ms,
            limit: config.max_requests,
        }
    }
}

/// Rate limiter over an injected store.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RateLimitStore> {
        &self.store
    }

    /// Check and count one request for `identifier`.
    pub async fn check(
        &self,
        identifier: &str,
        config: &RateLimitConfig,
        fail_mode: FailMode,
    ) -> RateLimitResult {
        self.check_at(identifier, config, fail_mode, Utc::now()).await
    }

    /// [`check`](Self::check) with an explicit clock reading.
    pub async fn check_at(
        &self,
        identifier: &str,
        config: &RateLimitConfig,
        fail_mode: FailMode,
        now: DateTime<Utc>,
    ) -> RateLimitResult {
        let key = config.key_for(identifier);

        let result = match self.try_check(&key, config, now).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(key = %key, error = %e, fail_mode = ?fail_mode, "Rate limit store error");
                metrics::record_rate_limit_store_error(&config.prefix);
                fallback_result(config, fail_mode)
            }
        };

        if !result.allowed {
            tracing::warn!(key = %key, reset_in_ms = result.reset_in, "Rate limit exceeded");
        }
        metrics::record_rate_limit_decision(&config.prefix, result.allowed);
        result
    }

    async fn try_check(
        &self,
        key: &str,
        config: &RateLimitConfig,
        now: DateTime<Utc>,
    ) -> StoreResult<RateLimitResult> {
        let swept = self
            .store
            .delete_where(&|r: &RateLimitRecord| r.is_expired(now))
            .await?;
        if swept > 0 {
            tracing::debug!(swept, "Purged expired rate limit windows");
        }

        let record = match self.store.get(key).await? {
            Some(record) if !record.is_expired(now) => record,
            // Absent, or expired but missed by the sweep: start a new window.
            _ => {
                self.store
                    .put(RateLimitRecord::first(key, now, config.window()))
                    .await?;
                return Ok(RateLimitResult {
                    allowed: true,
                    remaining: config.max_requests.saturating_sub(1),
                    reset_in: config.window_ms,
                    limit: config.max_requests,
                });
            }
        };

        let reset_in = millis_until(record.expires_at, now);

        if record.count >= config.max_requests {
            return Ok(RateLimitResult {
                allowed: false,
                remaining: 0,
                reset_in,
                limit: config.max_requests,
            });
        }

        let count = record.count + 1;
        self.store.put(RateLimitRecord { count, ..record }).await?;

        Ok(RateLimitResult {
            allowed: true,
            remaining: config.max_requests.saturating_sub(count),
            reset_in,
            limit: config.max_requests,
        })
    }
}

fn fallback_result(config: &RateLimitConfig, fail_mode: FailMode) -> RateLimitResult {
    match fail_mode {
        FailMode::Open => RateLimitResult::full_allowance(config),
        FailMode::Closed => RateLimitResult::denied(config),
    }
}

fn millis_until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    u64::try_from((deadline - now).num_milliseconds()).unwrap_or(0)
}
