//! Axum middleware wrapping every route.

pub mod csrf;
pub mod metrics;

pub use csrf::csrf_middleware;
pub use metrics::track_metrics;
