//! # Lifecycle (§3.4, §5 "Shutdown")
//!
//! Owns the dispatcher's interval-tick task, the scheduler, and the shared
//! handles it was built from, with explicit start/stop order instead of
//! leaving them as implicit process globals (§9 "singletons are
//! process-wide state with explicit lifecycle").

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::reconcile::Dispatcher;
use crate::scheduler::InactivityScheduler;

/// A running (or stopped) orchestrator instance.
pub struct Orchestrator {
    scheduler: InactivityScheduler,
    dispatcher_task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator").finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Starts the reconciliation dispatcher on a background task, ticking
    /// every `poll_interval`. If `auto_enabled` is false, the dispatcher
    /// task is never spawned — `stop()` is still safe to call.
    pub fn start(dispatcher: Dispatcher, scheduler: InactivityScheduler, poll_interval: Duration, auto_enabled: bool) -> Self {
        if !auto_enabled {
            info!("reconciliation loop disabled (TASKS_AUTO_ENABLED=false)");
            return Self {
                scheduler,
                dispatcher_task: None,
            };
        }

        let dispatcher = Arc::new(dispatcher);
        let dispatcher_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                dispatcher.tick().await;
            }
        });

        info!(poll_interval_ms = poll_interval.as_millis() as u64, "reconciliation loop started");
        Self {
            scheduler,
            dispatcher_task: Some(dispatcher_task),
        }
    }

    /// Stops the dispatcher (no further ticks) and cancels every scheduler
    /// entry. In-flight timer callbacks are allowed to finish or be
    /// abandoned — no data integrity relies on them completing, since the
    /// next startup's first tick re-derives state from the store (§5).
    pub async fn stop(self) {
        if let Some(task) = self.dispatcher_task {
            task.abort();
            let _ = task.await;
        }

        for task_id in self.scheduler.task_ids() {
            self.scheduler.cancel(&task_id);
        }
        info!("orchestrator stopped");
    }
}
