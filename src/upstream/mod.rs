//! Upstream proxy subsystem.
//!
//! # Data Flow
//! ```text
//! Authorized ResolvedTarget + client headers
//!     → credentials.rs (auth string, tag, masking IP, proxy host)
//!     → builder.rs (assemble UpstreamRequestSpec)
//!     → Hand off to http::forwarder
//! ```
//!
//! # Design Decisions
//! - Credentials sit behind a trait so the forwarding path never depends on the algorithm
//! - Specs are built fresh per request and never reused
//! - Proxy host selection may rotate on every call

pub mod builder;
pub mod credentials;

pub use builder::{UpstreamRequestBuilder, UpstreamRequestSpec};
pub use credentials::{SogouCredentials, UpstreamCredentials};
