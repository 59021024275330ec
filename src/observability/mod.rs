//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!
//! Consumers:
//!     → stdout of each worker process (inherited by the supervisor)
//! ```
//!
//! # Design Decisions
//! - Structured fields (peer, target, session id) on every request event
//! - Session ID flows from connect to teardown
//! - Level from config, overridable through `RUST_LOG`

pub mod logging;

pub use logging::init_logging;
