//! Request-safety toolkit for the portfolio site.
//!
//! Three independent checks that HTTP handlers run before privileged or
//! costly work:
//! - [`security::rate_limit`]: fixed-window counters over a shared store
//! - [`security::url_validator`]: SSRF guard for outbound URLs
//! - [`security::csrf`]: origin allow-list for mutating requests
//!
//! The [`http`] module exposes them as a small service shared by both
//! frontends.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::GuardConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
