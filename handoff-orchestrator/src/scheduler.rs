//! # Inactivity Scheduler
//!
//! Per-entry cancellable deadlines (§4.1, design note "timers as first-class
//! cancellable deadlines"). `Schedule` arms a `(ping, inactive)` pair of
//! `tokio::spawn` futures anchored to the greeting timestamp, not to arm
//! time, so a re-arm after a restart fires overdue deadlines immediately.
//! `Cancel` aborts both tasks; re-entrant `Cancel` from inside a running
//! callback is expected (the inactive callback cancels itself on success)
//! and is safe because `DashMap::remove` does not hold a lock across the
//! `JoinHandle::abort` call.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::error;

const PING_DELAY: chrono::Duration = chrono::Duration::seconds(5);
const INACTIVE_DELAY: chrono::Duration = chrono::Duration::seconds(30);

struct ScheduledEntry {
    ping: JoinHandle<()>,
    inactive: JoinHandle<()>,
}

/// Bookkeeping only: arms and cancels deadlines. Never executes pipeline
/// logic itself — callbacks re-read task state and decide what to do.
#[derive(Debug, Clone, Default)]
pub struct InactivityScheduler {
    entries: Arc<DashMap<String, ScheduledEntry>>,
}

impl std::fmt::Debug for ScheduledEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledEntry").finish_non_exhaustive()
    }
}

fn delay_until(anchor: DateTime<Utc>, offset: chrono::Duration, now: DateTime<Utc>) -> std::time::Duration {
    let target = anchor + offset;
    let remaining = target - now;
    remaining.to_std().unwrap_or(std::time::Duration::ZERO)
}

impl InactivityScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a fresh `(ping, inactive)` pair anchored to `greeting_sent_at`.
    /// Cancels any existing entry for `task_id` first. Callback panics are
    /// caught and logged; the sibling timer is unaffected (§4.1 Failure).
    pub fn schedule<PingFut, InactiveFut>(
        &self,
        task_id: impl Into<String>,
        greeting_sent_at: DateTime<Utc>,
        now: DateTime<Utc>,
        on_ping: impl FnOnce() -> PingFut + Send + 'static,
        on_inactive: impl FnOnce() -> InactiveFut + Send + 'static,
    ) where
        PingFut: Future<Output = ()> + Send + 'static,
        InactiveFut: Future<Output = ()> + Send + 'static,
    {
        let task_id = task_id.into();
        self.cancel(&task_id);

        let ping_delay = delay_until(greeting_sent_at, PING_DELAY, now);
        let inactive_delay = delay_until(greeting_sent_at, INACTIVE_DELAY, now);

        let ping_label = task_id.clone();
        let ping = tokio::spawn(async move {
            tokio::time::sleep(ping_delay).await;
            if let Err(panic) = std::panic::AssertUnwindSafe(on_ping())
                .catch_unwind()
                .await
            {
                error!(task_id = %ping_label, ?panic, "ping callback panicked");
            }
        });

        let inactive_label = task_id.clone();
        let inactive = tokio::spawn(async move {
            tokio::time::sleep(inactive_delay).await;
            if let Err(panic) = std::panic::AssertUnwindSafe(on_inactive())
                .catch_unwind()
                .await
            {
                error!(task_id = %inactive_label, ?panic, "inactive callback panicked");
            }
        });

        self.entries.insert(task_id, ScheduledEntry { ping, inactive });
    }

    /// Aborts both deadlines if present. Idempotent if absent.
    pub fn cancel(&self, task_id: &str) {
        if let Some((_, entry)) = self.entries.remove(task_id) {
            entry.ping.abort();
            entry.inactive.abort();
        }
    }

    pub fn has(&self, task_id: &str) -> bool {
        self.entries.contains_key(task_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of currently-armed task ids, for shutdown to cancel every
    /// entry without assuming callers track ids elsewhere.
    pub fn task_ids(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    #[tokio::test(start_paused = true)]
    async fn schedule_fires_ping_then_inactive_in_order() {
        let scheduler = InactivityScheduler::new();
        let pings = Arc::new(AtomicUsize::new(0));
        let inactives = Arc::new(AtomicUsize::new(0));

        let now = Utc::now();
        let p = pings.clone();
        let i = inactives.clone();
        scheduler.schedule(
            "T1",
            now,
            now,
            move || {
                let p = p.clone();
                async move {
                    p.fetch_add(1, Ordering::SeqCst);
                }
            },
            move || {
                let i = i.clone();
                async move {
                    i.fetch_add(1, Ordering::SeqCst);
                }
            },
        );

        assert!(scheduler.has("T1"));
        tokio::time::advance(StdDuration::from_secs(6)).await;
        tokio::task::yield_now().await;
        assert_eq!(pings.load(Ordering::SeqCst), 1);
        assert_eq!(inactives.load(Ordering::SeqCst), 0);

        tokio::time::advance(StdDuration::from_secs(25)).await;
        tokio::task::yield_now().await;
        assert_eq!(inactives.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_future_firings() {
        let scheduler = InactivityScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let now = Utc::now();
        let f = fired.clone();
        scheduler.schedule(
            "T2",
            now,
            now,
            move || {
                let f = f.clone();
                async move {
                    f.fetch_add(1, Ordering::SeqCst);
                }
            },
            || async {},
        );

        scheduler.cancel("T2");
        assert!(!scheduler.has("T2"));

        tokio::time::advance(StdDuration::from_secs(40)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn re_schedule_replaces_existing_entry() {
        let scheduler = InactivityScheduler::new();
        let now = Utc::now();
        scheduler.schedule("T3", now, now, || async {}, || async {});
        assert_eq!(scheduler.len(), 1);
        scheduler.schedule("T3", now, now, || async {}, || async {});
        assert_eq!(scheduler.len(), 1, "re-scheduling must not leak entries");
    }

    #[tokio::test]
    async fn task_ids_reflects_armed_entries() {
        let scheduler = InactivityScheduler::new();
        let now = Utc::now();
        scheduler.schedule("T4", now, now, || async {}, || async {});
        scheduler.schedule("T5", now, now, || async {}, || async {});
        let mut ids = scheduler.task_ids();
        ids.sort();
        assert_eq!(ids, vec!["T4".to_string(), "T5".to_string()]);
    }

    #[test]
    fn overdue_anchor_yields_zero_delay() {
        let greeting = Utc::now() - chrono::Duration::seconds(40);
        let now = Utc::now();
        assert_eq!(delay_until(greeting, PING_DELAY, now), StdDuration::ZERO);
        assert_eq!(delay_until(greeting, INACTIVE_DELAY, now), StdDuration::ZERO);
    }

    #[test]
    fn future_anchor_yields_positive_delay() {
        let greeting = Utc::now();
        let now = greeting;
        let delay = delay_until(greeting, PING_DELAY, now);
        assert_eq!(delay, StdDuration::from_secs(5));
    }
}
