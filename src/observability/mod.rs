//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout log aggregation
//!     → Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Structured fields (`key = %key`) rather than formatted messages
//! - Request ID is attached by the HTTP layer and appears on every trace span
//! - Metrics are cheap no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
