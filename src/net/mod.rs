//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Worker start
//!     → listener.rs (SO_REUSEPORT bind on the shared port)
//!     → Hand off to HTTP layer
//!
//! Supervisor start
//!     → address.rs (advertised address for the PAC file)
//! ```
//!
//! # Design Decisions
//! - Every worker binds its own socket; the kernel balances accepts
//! - Bind address is always the wildcard address
//! - Listener sockets are non-blocking and handed to Tokio

pub mod address;
pub mod listener;
