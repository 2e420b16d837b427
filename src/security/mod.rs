//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → csrf.rs (origin check on mutating methods)
//!     → headers.rs (derive client identifier)
//!     → rate_limit.rs (fixed-window check against store.rs)
//!     → url_validator.rs (before any outbound fetch)
//!     → handler
//! ```
//!
//! # Design Decisions
//! - The three checks are independent and composable
//! - Each returns a verdict plus detail; none panics or propagates store errors
//! - Counters live only in the injected store, never in process globals

pub mod csrf;
pub mod headers;
pub mod rate_limit;
pub mod store;
pub mod url_validator;

pub use csrf::CsrfGuard;
pub use headers::{client_identifier, rate_limit_headers};
pub use rate_limit::{FailMode, RateLimitConfig, RateLimitPreset, RateLimitResult, RateLimiter};
pub use store::{MemoryStore, RateLimitRecord, RateLimitStore, StoreError};
pub use url_validator::{assert_valid_url, validate_url, UrlRejection, UrlValidationResult};
