//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from a TOML file, and
//! every section has defaults so an empty file is a valid config.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for the guard service.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct GuardConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request size limits.
    pub security: SecurityConfig,

    /// Rate limiter storage settings.
    pub rate_limit: RateLimitSettings,

    /// Origin allow-list for the CSRF guard.
    pub csrf: CsrfConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total handler time) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 10 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 64 * 1024, // 64KB
        }
    }
}

/// Rate limiter settings. Limits themselves are fixed per preset.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RateLimitSettings {
    /// When false, the check endpoint always allows without touching the store.
    pub enabled: bool,

    /// Where the in-memory store snapshots its counters on shutdown.
    pub persistence_path: Option<PathBuf>,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            persistence_path: None,
        }
    }
}

/// CSRF origin allow-list.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CsrfConfig {
    /// Enable the origin check on mutating requests.
    pub enabled: bool,

    /// Exact origins (scheme://host[:port]) that may issue mutating requests.
    pub allowed_origins: Vec<String>,

    /// Any origin ending in this suffix is trusted (preview deployments).
    /// Empty disables the suffix rule.
    pub preview_suffix: String,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: vec![
                "https://folio.dev".to_string(),
                "https://www.folio.dev".to_string(),
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
            preview_suffix: ".vercel.app".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the admin routes.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

/// Placeholder key rejected by validation when the admin API is enabled.
pub const PLACEHOLDER_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: PLACEHOLDER_API_KEY.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: GuardConfig = toml::from_str("").unwrap();
        assert_eq!(config, GuardConfig::default());
        assert_eq!(config.csrf.allowed_origins.len(), 4);
    }

    #[test]
    fn test_partial_sections() {
        let config: GuardConfig = toml::from_str(
            r#"
            [listener]
            bind_address = "127.0.0.1:9000"

            [csrf]
            allowed_origins = ["https://cv.example.org"]

            [rate_limit]
            persistence_path = "/var/lib/folio-guard/limits.json"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.csrf.allowed_origins, vec!["https://cv.example.org"]);
        assert_eq!(config.csrf.preview_suffix, ".vercel.app");
        assert!(config.rate_limit.enabled);
        assert_eq!(
            config.rate_limit.persistence_path,
            Some(PathBuf::from("/var/lib/folio-guard/limits.json"))
        );
    }
}
