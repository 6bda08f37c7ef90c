//! The in-flight tracker (§4.6): a counter of running dispatch tasks,
//! awaited on shutdown to drain within the grace period.
//!
//! Per §4.8's state machine, `enter()` is called before a task is scheduled
//! and the returned guard's `Drop` calls `leave()` exactly once on every
//! exit path, including a panic unwinding through the task — satisfying the
//! §8 "shutdown safety" property without relying on handler code to
//! remember to decrement.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

/// Returned by [`InFlightTracker::enter`] once the server has begun
/// shutting down and is no longer accepting new dispatch tasks (§8
/// "shutdown safety": "no new F- or G-task may be scheduled after
/// `shutdown()` returns").
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("shutdown in progress, refusing to schedule new dispatch task")]
pub struct ShutdownInProgress;

struct Inner {
    count: AtomicI64,
    accepting: AtomicBool,
    notify: Notify,
}

/// Shared, clonable handle to the process-lifetime in-flight counter.
#[derive(Clone)]
pub struct InFlightTracker {
    inner: Arc<Inner>,
}

impl Default for InFlightTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                count: AtomicI64::new(0),
                accepting: AtomicBool::new(true),
                notify: Notify::new(),
            }),
        }
    }

    /// Enter the `[queued] -> [running]` transition. Fails if shutdown has
    /// already stopped acceptance.
    pub fn enter(&self) -> Result<InFlightGuard, ShutdownInProgress> {
        if !self.inner.accepting.load(Ordering::SeqCst) {
            return Err(ShutdownInProgress);
        }
        self.inner.count.fetch_add(1, Ordering::SeqCst);
        Ok(InFlightGuard {
            inner: self.inner.clone(),
        })
    }

    pub fn count(&self) -> i64 {
        self.inner.count.load(Ordering::SeqCst)
    }

    /// Stop accepting new entries (§4.6 shutdown step 1: "Stop accepting new
    /// HTTP requests" extends to stop scheduling new dispatch tasks).
    pub fn stop_accepting(&self) {
        self.inner.accepting.store(false, Ordering::SeqCst);
    }

    /// Block until the counter reaches zero or `deadline` elapses. Returns
    /// `true` if fully drained, `false` if the deadline was hit first (§4.6
    /// step 2, §8 "shutdown safety").
    pub async fn wait(&self, deadline: Duration) -> bool {
        let wait_for_drain = async {
            loop {
                // Register for the next wakeup before checking the count, so a
                // guard dropping between the check and the registration still
                // wakes us up instead of being missed (`notify_waiters()`
                // stores no permit for waiters that subscribe afterwards).
                let notified = self.inner.notify.notified();
                if self.count() == 0 {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(deadline, wait_for_drain).await.is_ok()
    }
}

/// RAII guard representing one running dispatch task. Dropping it performs
/// the `leave()` half of the state machine exactly once, regardless of
/// whether the task completed, errored, or the future was cancelled.
pub struct InFlightGuard {
    inner: Arc<Inner>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let remaining = self.inner.count.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining <= 0 {
            self.inner.notify.notify_waiters();
        }
    }
}
