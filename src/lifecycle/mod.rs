//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Open store → Bind listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain requests → Save store snapshot
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast on invalid config; a corrupt store snapshot only logs
//! - Listener binds last, so traffic arrives only when ready

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
