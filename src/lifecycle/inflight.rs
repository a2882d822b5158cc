//! In-flight task tracking for graceful shutdown.
//!
//! # Responsibilities
//! - Count tasks spawned per DNS message
//! - Generate unique task IDs for tracing
//! - Let shutdown wait until the count drains to zero

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

/// Global atomic counter for task IDs.
/// Relaxed ordering is sufficient since we only need uniqueness.
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an in-flight task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    /// Generate a new unique task ID.
    pub fn new() -> Self {
        Self(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Tracks in-flight tasks so shutdown can drain them.
#[derive(Debug, Clone, Default)]
pub struct InFlightTracker {
    active_count: Arc<AtomicU64>,
    idle: Arc<Notify>,
}

impl InFlightTracker {
    /// Create a new tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new in-flight task. Returns a guard that decrements on drop.
    pub fn track(&self) -> InFlightGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            active_count: Arc::clone(&self.active_count),
            idle: Arc::clone(&self.idle),
            id: TaskId::new(),
        }
    }

    /// Get current in-flight task count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until no tasks remain or `timeout` elapses.
    ///
    /// Returns `true` if every task finished in time.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let drained = async {
            loop {
                let notified = self.idle.notified();
                if self.active_count() == 0 {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, drained).await.is_ok()
    }
}

/// Guard that tracks a task's lifetime.
/// Decrements the in-flight count when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    active_count: Arc<AtomicU64>,
    idle: Arc<Notify>,
    id: TaskId,
}

impl InFlightGuard {
    /// Get this task's ID.
    pub fn id(&self) -> TaskId {
        self.id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.active_count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
        tracing::trace!(task_id = %self.id, "Task finished");
    }
}
