//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Supervisor (startup.rs → supervisor.rs):
//!     Load config → Print PAC URL → Spawn N workers → Restart on crash, stop on startup failure
//!
//! Worker (startup.rs):
//!     Load config → Compile allow-list → Bind shared port → Serve
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → shutdown.rs broadcast → stop accepting / kill workers
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Workers are independent processes; the supervisor holds no proxy state

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod supervisor;

pub use shutdown::Shutdown;
pub use startup::{run_supervisor, run_worker, StartupError};
pub use supervisor::{Supervisor, SupervisorError};
