//! Shared-port TCP listener.
//!
//! # Responsibilities
//! - Bind the wildcard address with `SO_REUSEPORT` so every worker process
//!   can listen on the same port
//! - Hand the socket to Tokio in non-blocking mode
//! - Report bind failures distinctly

use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;

const BACKLOG: i32 = 1024;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to create or configure the socket.
    Socket(std::io::Error),
    /// Failed to bind to address.
    Bind(SocketAddr, std::io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Socket(e) => write!(f, "Failed to set up socket: {}", e),
            ListenerError::Bind(addr, e) => write!(f, "Failed to bind {}: {}", addr, e),
        }
    }
}

impl std::error::Error for ListenerError {}

/// Bind `addr` so that several processes may listen on it at once.
///
/// Must be called from within a Tokio runtime.
pub fn bind_shared(addr: SocketAddr) -> Result<TcpListener, ListenerError> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(ListenerError::Socket)?;
    socket.set_reuse_address(true).map_err(ListenerError::Socket)?;
    #[cfg(unix)]
    socket.set_reuse_port(true).map_err(ListenerError::Socket)?;
    socket.set_nonblocking(true).map_err(ListenerError::Socket)?;

    socket
        .bind(&addr.into())
        .map_err(|e| ListenerError::Bind(addr, e))?;
    socket.listen(BACKLOG).map_err(|e| ListenerError::Bind(addr, e))?;

    let listener = TcpListener::from_std(socket.into()).map_err(ListenerError::Socket)?;

    tracing::info!(address = %addr, "Listener bound");
    Ok(listener)
}
