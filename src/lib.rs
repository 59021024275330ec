//! Forward proxy that relays allow-listed HTTP requests through the Sogou
//! acceleration proxies, disguised as Sogou Explorer traffic.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod pac;
pub mod routing;
pub mod upstream;

pub use config::schema::ProxyConfig;
pub use http::ProxyServer;
pub use lifecycle::Shutdown;
