//! # Clock
//!
//! All durations the scheduler and pipelines compute are derived from wall
//! time, not from when a timer happens to be armed — §4.1 requires the
//! 5s/30s offsets be anchored to `greetingSentAt`, so that an orchestrator
//! restarted mid-epoch re-derives real elapsed time instead of restarting
//! the countdown. A trait, rather than calling `chrono::Utc::now()` directly,
//! lets tests drive specific timestamps deterministically (§8.4 scenario 3,
//! "Restart mid-epoch").

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

/// Wall-clock time source. `Send + Sync` so it can be shared across the
/// dispatcher, the scheduler's timer callbacks, and the webhook sink.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock, backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deterministic clock for tests: starts at a fixed instant and only moves
/// when told to. Cheap to clone (shares the same underlying cell) so a test
/// can hold one handle to advance time while another is wired into the
/// orchestrator under test.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().expect("manual clock mutex poisoned") = at;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.now.lock().expect("manual clock mutex poisoned");
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("manual clock mutex poisoned")
    }
}
