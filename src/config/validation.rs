//! Configuration validation.
//!
//! Serde handles syntax; this module checks values. Every problem is
//! reported, not just the first.

use std::fmt;
use std::net::SocketAddr;
use url::Url;

use crate::config::schema::{GuardConfig, PLACEHOLDER_API_KEY};

/// One semantic problem in a config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `csrf.allowed_origins`.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be greater than 0"));
    }

    for origin in &config.csrf.allowed_origins {
        if let Some(message) = origin_problem(origin) {
            errors.push(ValidationError::new(
                "csrf.allowed_origins",
                format!("'{origin}' {message}"),
            ));
        }
    }

    let suffix = &config.csrf.preview_suffix;
    if !suffix.is_empty() && !suffix.starts_with('.') {
        errors.push(ValidationError::new(
            "csrf.preview_suffix",
            "must start with '.' so it only matches whole subdomains",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if config.admin.enabled
        && (config.admin.api_key.is_empty() || config.admin.api_key == PLACEHOLDER_API_KEY)
    {
        errors.push(ValidationError::new(
            "admin.api_key",
            "must be set to a non-placeholder value when the admin API is enabled",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Origins are compared as exact strings, so they must already be in
/// serialized origin form.
fn origin_problem(origin: &str) -> Option<&'static str> {
    let Ok(url) = Url::parse(origin) else {
        return Some("is not a URL");
    };
    if url.origin().ascii_serialization() != origin {
        return Some("is not a bare origin (scheme://host[:port], no path or trailing slash)");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&GuardConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GuardConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.timeouts.request_secs = 0;
        config.csrf.allowed_origins.push("https://folio.dev/".into());
        config.csrf.preview_suffix = "vercel.app".into();
        config.admin.enabled = true;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "timeouts.request_secs",
                "csrf.allowed_origins",
                "csrf.preview_suffix",
                "admin.api_key",
            ]
        );
    }

    #[test]
    fn test_origin_forms() {
        assert_eq!(origin_problem("http://localhost:3000"), None);
        assert_eq!(origin_problem("https://folio.dev"), None);
        assert!(origin_problem("folio.dev").is_some());
        assert!(origin_problem("https://folio.dev/path").is_some());
        // Default ports are dropped by origin serialization.
        assert!(origin_problem("https://folio.dev:443").is_some());
    }

    #[test]
    fn test_admin_key_required_when_enabled() {
        let mut config = GuardConfig::default();
        config.admin.enabled = true;
        config.admin.api_key = "s3cret".into();
        assert_eq!(validate_config(&config), Ok(()));
    }
}
