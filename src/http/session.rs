//! Forwarding session lifecycle tracking.
//!
//! # Responsibilities
//! - Generate unique session IDs for tracing
//! - Count live sessions within a worker
//! - Tear down the upstream connection when the session is dropped
//!
//! A session lives from the upstream connect until the downstream response
//! body is dropped, whether it finished or the client went away.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::task::AbortHandle;

/// Global atomic counter for session IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static SESSION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a forwarding session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Generate a new unique session ID.
    pub fn new() -> Self {
        Self(SESSION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Counts active forwarding sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionTracker {
    active_count: Arc<AtomicU64>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new session. Returns a guard that decrements on drop.
    pub fn track(&self) -> SessionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        SessionGuard {
            active_count: Arc::clone(&self.active_count),
            id: SessionId::new(),
            upstream: None,
        }
    }

    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }
}

/// Guard owning one session's upstream connection task.
///
/// Dropping it aborts the upstream connection and decrements the active count.
#[derive(Debug)]
pub struct SessionGuard {
    active_count: Arc<AtomicU64>,
    id: SessionId,
    upstream: Option<AbortHandle>,
}

impl SessionGuard {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Bind the upstream connection task to this session's lifetime.
    pub fn attach_upstream(&mut self, handle: AbortHandle) {
        self.upstream = Some(handle);
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.upstream.take() {
            handle.abort();
        }
        let remaining = self.active_count.fetch_sub(1, Ordering::SeqCst) - 1;
        tracing::debug!(session_id = %self.id, active_sessions = remaining, "Session closed");
    }
}
