//! # Orchestrator Metrics
//!
//! A point-in-time counters snapshot, in the spirit of the teacher's
//! `CircuitBreakerMetrics`/`EventDrivenStats` types — gives the "surfaces via
//! logs and metrics only" language in spec §7 something concrete to surface.
//! All counters are monotonically increasing `u64`s behind atomics so both
//! the dispatcher and callback tasks can update them without a lock.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared, cheaply-cloned counters updated from the dispatcher and from
/// scheduler callbacks. `Arc`-free by design: every field is its own atomic,
/// so cloning a `Metrics` handle shares the same counters (the struct itself
/// holds `Arc<AtomicU64>`-free plain atomics behind a reference internally
/// via `Arc<Inner>`).
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    inner: std::sync::Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    ticks_run: AtomicU64,
    ticks_skipped_overlap: AtomicU64,
    internal_greetings_sent: AtomicU64,
    internal_pings_sent: AtomicU64,
    internal_closures_sent: AtomicU64,
    flex_greetings_sent: AtomicU64,
    flex_pings_sent: AtomicU64,
    flex_closures_sent: AtomicU64,
    provider_call_failures: AtomicU64,
    persistence_failures: AtomicU64,
}

/// Point-in-time values read out of a [`Metrics`] handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub ticks_run: u64,
    pub ticks_skipped_overlap: u64,
    pub internal_greetings_sent: u64,
    pub internal_pings_sent: u64,
    pub internal_closures_sent: u64,
    pub flex_greetings_sent: u64,
    pub flex_pings_sent: u64,
    pub flex_closures_sent: u64,
    pub provider_call_failures: u64,
    pub persistence_failures: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick_run(&self) {
        self.inner.ticks_run.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tick_skipped_overlap(&self) {
        self.inner.ticks_skipped_overlap.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_internal_greeting_sent(&self) {
        self.inner.internal_greetings_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_internal_ping_sent(&self) {
        self.inner.internal_pings_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_internal_closure_sent(&self) {
        self.inner.internal_closures_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flex_greeting_sent(&self) {
        self.inner.flex_greetings_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flex_ping_sent(&self) {
        self.inner.flex_pings_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flex_closure_sent(&self) {
        self.inner.flex_closures_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_provider_call_failure(&self) {
        self.inner.provider_call_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persistence_failure(&self) {
        self.inner.persistence_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks_run: self.inner.ticks_run.load(Ordering::Relaxed),
            ticks_skipped_overlap: self.inner.ticks_skipped_overlap.load(Ordering::Relaxed),
            internal_greetings_sent: self.inner.internal_greetings_sent.load(Ordering::Relaxed),
            internal_pings_sent: self.inner.internal_pings_sent.load(Ordering::Relaxed),
            internal_closures_sent: self.inner.internal_closures_sent.load(Ordering::Relaxed),
            flex_greetings_sent: self.inner.flex_greetings_sent.load(Ordering::Relaxed),
            flex_pings_sent: self.inner.flex_pings_sent.load(Ordering::Relaxed),
            flex_closures_sent: self.inner.flex_closures_sent.load(Ordering::Relaxed),
            provider_call_failures: self.inner.provider_call_failures.load(Ordering::Relaxed),
            persistence_failures: self.inner.persistence_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let metrics = Metrics::new();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn clone_shares_the_same_counters() {
        let metrics = Metrics::new();
        let handle = metrics.clone();
        handle.record_tick_run();
        assert_eq!(metrics.snapshot().ticks_run, 1);
    }

    #[test]
    fn each_counter_increments_independently() {
        let metrics = Metrics::new();
        metrics.record_internal_greeting_sent();
        metrics.record_flex_ping_sent();
        metrics.record_provider_call_failure();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.internal_greetings_sent, 1);
        assert_eq!(snapshot.flex_pings_sent, 1);
        assert_eq!(snapshot.provider_call_failures, 1);
        assert_eq!(snapshot.internal_pings_sent, 0);
    }
}
