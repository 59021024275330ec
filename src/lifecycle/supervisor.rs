//! Worker process supervision.
//!
//! # Responsibilities
//! - Spawn one worker process per configured slot, re-running this binary
//!   with `--worker-id <n>`
//! - Restart a worker that exits after it was up and serving
//! - Give up when a worker dies during startup
//! - Kill every worker on shutdown
//!
//! # Design Decisions
//! - Workers share nothing; each loads config and binds the port itself
//! - A worker exiting within `min_uptime` of its spawn failed to start; a
//!   restart would fail the same way, so the supervisor stops with an error
//! - Children are killed when their handle drops, so an aborted supervisor
//!   task never leaks a worker

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;

use crate::lifecycle::Shutdown;

/// Delay before a crashed worker is started again.
const RESTART_DELAY: Duration = Duration::from_secs(1);

/// A worker exiting sooner than this after spawn is a startup failure.
const MIN_UPTIME: Duration = Duration::from_secs(5);

/// Flag telling the binary to run as a worker.
pub const WORKER_ID_FLAG: &str = "--worker-id";

/// Errors that stop the supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to spawn worker {id}: {source}")]
    Spawn {
        id: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("worker {id} exited {uptime:?} after start ({status}); not restarting")]
    StartupFailure {
        id: usize,
        status: String,
        uptime: Duration,
    },

    #[error("worker wait task failed: {0}")]
    Join(#[from] JoinError),
}

/// How a worker process ended.
struct WorkerExit {
    id: usize,
    status: std::io::Result<ExitStatus>,
    uptime: Duration,
}

impl WorkerExit {
    fn describe(&self) -> String {
        match &self.status {
            Ok(status) => status.to_string(),
            Err(e) => format!("wait failed: {}", e),
        }
    }
}

/// Spawns and babysits worker processes.
#[derive(Debug, Clone)]
pub struct Supervisor {
    program: PathBuf,
    args: Vec<OsString>,
    workers: usize,
    min_uptime: Duration,
}

impl Supervisor {
    /// `args` are passed to every worker before the worker-id flag.
    pub fn new(program: PathBuf, args: Vec<OsString>, workers: usize) -> Self {
        Self {
            program,
            args,
            workers,
            min_uptime: MIN_UPTIME,
        }
    }

    /// Override how long a worker must run before an exit counts as a crash.
    pub fn with_min_uptime(mut self, min_uptime: Duration) -> Self {
        self.min_uptime = min_uptime;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Command line for worker `id`.
    pub fn worker_command(&self, id: usize) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(WORKER_ID_FLAG)
            .arg(id.to_string())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        command
    }

    /// Run until `shutdown` fires, then kill all workers.
    ///
    /// Returns an error when a worker fails during startup; the remaining
    /// workers are killed first.
    pub async fn run(self, shutdown: &Shutdown) -> Result<(), SupervisorError> {
        let mut shutdown_rx = shutdown.subscribe();
        let mut running = JoinSet::new();

        let result = 'supervise: {
            for id in 0..self.workers {
                if let Err(e) = self.spawn_worker(&mut running, id) {
                    break 'supervise Err(e);
                }
            }

            loop {
                let joined = tokio::select! {
                    _ = shutdown_rx.recv() => break Ok(()),
                    Some(joined) = running.join_next() => joined,
                };
                let exit = match joined {
                    Ok(exit) => exit,
                    Err(e) => break Err(SupervisorError::Join(e)),
                };

                if exit.uptime < self.min_uptime {
                    tracing::error!(
                        worker_id = exit.id,
                        status = %exit.describe(),
                        uptime_ms = exit.uptime.as_millis() as u64,
                        "Worker failed during startup"
                    );
                    break Err(SupervisorError::StartupFailure {
                        id: exit.id,
                        status: exit.describe(),
                        uptime: exit.uptime,
                    });
                }

                tracing::warn!(
                    worker_id = exit.id,
                    status = %exit.describe(),
                    "Worker exited, restarting"
                );
                tokio::select! {
                    _ = shutdown_rx.recv() => break Ok(()),
                    _ = tokio::time::sleep(RESTART_DELAY) => {}
                }
                if let Err(e) = self.spawn_worker(&mut running, exit.id) {
                    break Err(e);
                }
            }
        };

        tracing::info!(workers = running.len(), "Stopping workers");
        running.shutdown().await;
        result
    }

    fn spawn_worker(
        &self,
        running: &mut JoinSet<WorkerExit>,
        id: usize,
    ) -> Result<(), SupervisorError> {
        let mut child = self
            .worker_command(id)
            .spawn()
            .map_err(|source| SupervisorError::Spawn { id, source })?;
        tracing::info!(worker_id = id, pid = ?child.id(), "Worker started");

        let started = Instant::now();
        running.spawn(async move {
            let status = child.wait().await;
            WorkerExit {
                id,
                status,
                uptime: started.elapsed(),
            }
        });
        Ok(())
    }
}
