//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GuardConfig (validated, immutable)
//!     → shared via ArcSwap with the HTTP layer
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of config and CSRF guard
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Listener and store settings only apply at startup; the CSRF allow-list,
//!   rate limit toggle and admin key apply on reload

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError, ConfigOverrides};
pub use schema::{
    AdminConfig, CsrfConfig, GuardConfig, ListenerConfig, ObservabilityConfig, RateLimitSettings,
    SecurityConfig, TimeoutConfig,
};
