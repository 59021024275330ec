//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (shared-port listener)
//!     → server.rs (Axum setup, special endpoints, pipeline)
//!     → [routing layer resolves and authorizes the target]
//!     → [upstream layer builds the disguised request]
//!     → forwarder.rs (connect, stream both directions)
//!     → session.rs (session lifetime, upstream teardown)
//!     → Send to client
//! ```

pub mod error;
pub mod forwarder;
pub mod server;
pub mod session;

pub use error::ProxyError;
pub use forwarder::Forwarder;
pub use server::ProxyServer;
pub use session::{SessionGuard, SessionId, SessionTracker};
