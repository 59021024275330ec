//! unblock-proxy
//!
//! Forward proxy for allow-listed mainland-China media endpoints, relayed
//! through the Sogou acceleration proxies.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────── SUPERVISOR ───────────────────────┐
//!                      │  config → print PAC URL → spawn N workers (one per core)  │
//!                      └───────────────┬───────────────────────────────────────────┘
//!                                      │ re-exec with --worker-id
//!                 ┌────────────────────┼────────────────────┐
//!                 ▼                    ▼                    ▼
//!           ┌──────────┐         ┌──────────┐         ┌──────────┐
//!           │ worker 0 │   ...   │ worker i │   ...   │ worker n │   SO_REUSEPORT
//!           └────┬─────┘         └──────────┘         └──────────┘   same port
//!                │
//!   Client ──────┼─▶ dispatcher ─▶ resolver ─▶ allow_list ─▶ builder ─▶ forwarder ─▶ Sogou proxy
//!   Client ◀─────┼───────────────────────── streamed response ◀──────────────────────
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use unblock_proxy::config::load_config;
use unblock_proxy::lifecycle::{run_supervisor, run_worker};
use unblock_proxy::observability::init_logging;

/// Forward proxy relaying allow-listed requests through the Sogou proxies
#[derive(Parser)]
#[command(name = "unblock-proxy", long_about = None)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of worker processes (0 = one per core).
    #[arg(short, long)]
    workers: Option<usize>,

    /// Run as worker process `n` (set by the supervisor).
    #[arg(long, hide = true)]
    worker_id: Option<usize>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(workers) = cli.workers {
        config.listener.workers = workers;
    }

    init_logging(&config.observability.log_level);

    // Each process runs a single-threaded event loop.
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.worker_id {
        Some(id) => runtime.block_on(run_worker(config, id)),
        None => {
            tracing::info!("unblock-proxy v{} starting", env!("CARGO_PKG_VERSION"));
            runtime.block_on(run_supervisor(config, cli.config))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Proxy terminated");
            ExitCode::FAILURE
        }
    }
}
