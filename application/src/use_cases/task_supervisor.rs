//! Supervision for fire-and-forget tasks.
//!
//! Submission handlers are synchronous but need to launch agent invocations
//! they do not wait for. [`TaskSupervisor`] tracks every such task, logs how
//! each one ended, and can wait for or cancel all of them at shutdown.

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Live task count, signalled when it drops to zero
#[derive(Default)]
struct Activity {
    active: AtomicUsize,
    idle: Notify,
}

/// Held by a running task; dropping it (normally or on abort) releases the slot.
struct ActiveSlot(Arc<Activity>);

impl ActiveSlot {
    fn acquire(activity: &Arc<Activity>) -> Self {
        activity.active.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(activity))
    }
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        if self.0.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Tracks the background tasks of one session.
pub struct TaskSupervisor {
    scope: String,
    cancel: CancellationToken,
    activity: Arc<Activity>,
}

impl TaskSupervisor {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            cancel: CancellationToken::new(),
            activity: Arc::new(Activity::default()),
        }
    }

    /// Launch `task` in the background.
    ///
    /// An `Err` result or a panic is logged at `warn`; a task stopped by
    /// [`cancel_all`](Self::cancel_all) is logged at `debug` only.
    pub fn spawn<F, E>(&self, label: impl Into<String>, task: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: std::fmt::Display,
    {
        if self.cancel.is_cancelled() {
            debug!(scope = %self.scope, "Supervisor cancelled; not spawning");
            return;
        }

        let label = label.into();
        let scope = self.scope.clone();
        let cancel = self.cancel.clone();
        // Counted before the spawn so a waiter never sees a gap
        let slot = ActiveSlot::acquire(&self.activity);
        tokio::spawn(async move {
            let _slot = slot;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(scope = %scope, task = %label, "Task cancelled");
                }
                outcome = AssertUnwindSafe(task).catch_unwind() => match outcome {
                    Ok(Ok(())) => debug!(scope = %scope, task = %label, "Task finished"),
                    Ok(Err(e)) => warn!(scope = %scope, task = %label, "Task failed: {}", e),
                    Err(_) => warn!(scope = %scope, task = %label, "Task panicked"),
                },
            }
        });
    }

    /// Number of tasks that have not finished yet.
    pub fn pending(&self) -> usize {
        self.activity.active.load(Ordering::SeqCst)
    }

    /// Wait until every task has finished, including tasks spawned meanwhile.
    ///
    /// Cancel-safe: dropping the returned future loses nothing.
    pub async fn wait_all(&self) {
        loop {
            let idle = self.activity.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            idle.await;
        }
    }

    /// Cancel every task and wait for them to unwind. Later spawns are refused.
    pub async fn cancel_all(&self) {
        self.cancel.cancel();
        self.wait_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_all_observes_every_task() {
        let supervisor = TaskSupervisor::new("s-1");
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let done = done.clone();
            supervisor.spawn("count", async move {
                done.fetch_add(1, Ordering::SeqCst);
                Ok::<(), String>(())
            });
        }
        supervisor.spawn("fails", async { Err::<(), _>("boom".to_string()) });

        supervisor.wait_all().await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert_eq!(supervisor.pending(), 0);
    }

    #[tokio::test]
    async fn test_panicking_task_does_not_poison_supervisor() {
        let supervisor = TaskSupervisor::new("s-1");
        supervisor.spawn("panics", async {
            if true {
                panic!("agent task blew up");
            }
            Ok::<(), String>(())
        });
        supervisor.wait_all().await;

        let ran = Arc::new(AtomicUsize::new(0));
        let flag = ran.clone();
        supervisor.spawn("after", async move {
            flag.fetch_add(1, Ordering::SeqCst);
            Ok::<(), String>(())
        });
        supervisor.wait_all().await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_stops_pending_tasks() {
        let supervisor = TaskSupervisor::new("s-1");
        let finished = Arc::new(AtomicUsize::new(0));
        let flag = finished.clone();
        supervisor.spawn("slow", async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            flag.fetch_add(1, Ordering::SeqCst);
            Ok::<(), String>(())
        });

        supervisor.cancel_all().await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        // Spawns after cancellation are refused
        supervisor.spawn("late", async { Ok::<(), String>(()) });
        assert_eq!(supervisor.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_wait_does_not_lose_tasks() {
        let supervisor = TaskSupervisor::new("s-1");
        let finished = Arc::new(AtomicUsize::new(0));
        let flag = finished.clone();
        supervisor.spawn("slow", async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            flag.fetch_add(1, Ordering::SeqCst);
            Ok::<(), String>(())
        });

        let early = tokio::time::timeout(Duration::from_secs(1), supervisor.wait_all()).await;
        assert!(early.is_err());
        assert_eq!(supervisor.pending(), 1);

        supervisor.wait_all().await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
