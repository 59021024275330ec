//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Raw request target (absolute URL or "/?url=<base64>")
//!     → dispatcher.rs (favicon, crossdomain.xml, proxy.pac short-circuit)
//!     → resolver.rs (decode destination into ResolvedTarget)
//!     → allow_list.rs (authorize the destination href)
//!     → Return: authorized target or 403
//!
//! Allow-list Compilation (at worker start):
//!     url globs + raw patterns
//!     → Compile to anchored regexes
//!     → Freeze as immutable AllowList
//! ```
//!
//! # Design Decisions
//! - Allow-list compiled at startup, immutable at runtime
//! - Resolution never fails: bad input yields the no-host sentinel
//! - Unresolvable and disallowed targets look identical to the client
//! - First match wins

pub mod allow_list;
pub mod dispatcher;
pub mod resolver;

pub use allow_list::AllowList;
pub use dispatcher::SpecialEndpoint;
pub use resolver::{resolve_target, ResolvedTarget};
