//! Startup orchestration.
//!
//! # Responsibilities
//! - Print the PAC URL for the operator
//! - Decide between in-process serving and a pool of worker processes
//! - Start a worker: bind the shared port, build the server, serve until signalled
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal, in a worker as in the supervisor
//! - Workers run inside a `worker` span so interleaved logs stay attributable

use std::ffi::OsString;
use std::path::PathBuf;

use thiserror::Error;
use tracing::Instrument;

use crate::config::{ConfigError, ProxyConfig};
use crate::http::ProxyServer;
use crate::lifecycle::signals::spawn_signal_handler;
use crate::lifecycle::supervisor::{Supervisor, SupervisorError};
use crate::lifecycle::Shutdown;
use crate::net::listener::{bind_shared, ListenerError};
use crate::routing::dispatcher::PAC_PATH;

/// Errors that stop the proxy from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("listener error: {0}")]
    Listener(#[from] ListenerError),

    #[error("supervisor error: {0}")]
    Supervisor(#[from] SupervisorError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The line printed once at startup telling users where the PAC file lives.
pub fn startup_banner(config: &ProxyConfig) -> String {
    let address = config
        .listener
        .public_address
        .clone()
        .unwrap_or_else(|| format!("127.0.0.1:{}", config.listener.port));
    format!("Please use this PAC file: http://{}{}", address, PAC_PATH)
}

/// Entry point for the parent process.
///
/// With a single worker the proxy serves in this process; otherwise it
/// re-executes itself once per worker and supervises the children.
pub async fn run_supervisor(
    config: ProxyConfig,
    config_path: Option<PathBuf>,
) -> Result<(), StartupError> {
    println!("{}", startup_banner(&config));

    let workers = config.listener.worker_count();
    if workers == 1 {
        return run_worker(config, 0).await;
    }

    let mut args: Vec<OsString> = Vec::new();
    if let Some(path) = config_path {
        args.push("--config".into());
        args.push(path.into_os_string());
    }

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let supervisor = Supervisor::new(std::env::current_exe()?, args, workers);
    tracing::info!(workers = supervisor.workers(), "Starting worker processes");
    supervisor.run(&shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Serve on the shared port until SIGINT/SIGTERM.
pub async fn run_worker(config: ProxyConfig, worker_id: usize) -> Result<(), StartupError> {
    let span = tracing::info_span!("worker", id = worker_id);
    async move {
        let server = ProxyServer::new(&config)?;
        let listener = bind_shared(config.listener.bind_address())?;
        tracing::info!(address = %listener.local_addr()?, "Listening");

        let shutdown = Shutdown::new();
        spawn_signal_handler(shutdown.clone());
        server.run(listener, shutdown.subscribe()).await?;
        Ok::<(), StartupError>(())
    }
    .instrument(span)
    .await
}
