//! # Circuit Breaker
//!
//! Closed → Open → Half-Open → Closed state machine behind a single mutex.
//! Kept simple and lock-based rather than lock-free atomics: circuit breaker
//! operations happen once per provider call, not in a hot loop, so contention
//! is not a concern and a mutex keeps the state-transition logic easy to
//! read and verify against §4 of the design.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::behavior::CircuitBreakerBehavior;
use super::config::CircuitBreakerConfig;
use super::metrics::CircuitBreakerMetrics;
use super::state::CircuitState;

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_successes: u32,
    opened_at: Option<Instant>,
    total_calls: u64,
    success_count: u64,
    failure_count: u64,
    half_open_calls: u64,
    total_duration: Duration,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            half_open_successes: 0,
            opened_at: None,
            total_calls: 0,
            success_count: 0,
            failure_count: 0,
            half_open_calls: 0,
            total_duration: Duration::ZERO,
        }
    }
}

/// A named circuit breaker guarding one external dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("circuit breaker mutex poisoned")
    }

    /// Whether the circuit currently allows a call through. Transitions
    /// Open → HalfOpen when the recovery timeout has elapsed.
    pub fn should_allow(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = inner.opened_at.map(|at| at.elapsed()).unwrap_or_default();
                if elapsed >= self.config.timeout {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_successes = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success_manual(&self, duration: Duration) {
        let mut inner = self.lock();
        inner.total_calls += 1;
        inner.success_count += 1;
        inner.total_duration += duration;
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                inner.half_open_calls += 1;
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.consecutive_failures = 0;
                    inner.half_open_successes = 0;
                    inner.opened_at = None;
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure_manual(&self, duration: Duration) {
        let mut inner = self.lock();
        inner.total_calls += 1;
        inner.failure_count += 1;
        inner.total_duration += duration;
        inner.consecutive_failures += 1;
        match inner.state {
            CircuitState::Closed => {
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.half_open_successes = 0;
            }
            CircuitState::Open => {
                inner.opened_at = Some(Instant::now());
            }
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn force_open(&self) {
        let mut inner = self.lock();
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
    }

    pub fn force_closed(&self) {
        let mut inner = self.lock();
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.half_open_successes = 0;
        inner.opened_at = None;
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let inner = self.lock();
        CircuitBreakerMetrics {
            total_calls: inner.total_calls,
            success_count: inner.success_count,
            failure_count: inner.failure_count,
            consecutive_failures: inner.consecutive_failures as u64,
            half_open_calls: inner.half_open_calls,
            total_duration: inner.total_duration,
            current_state: inner.state,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.metrics().is_healthy()
    }
}

impl CircuitBreakerBehavior for CircuitBreaker {
    fn name(&self) -> &str {
        CircuitBreaker::name(self)
    }

    fn state(&self) -> CircuitState {
        CircuitBreaker::state(self)
    }

    fn should_allow(&self) -> bool {
        CircuitBreaker::should_allow(self)
    }

    fn record_success(&self, duration: Duration) {
        self.record_success_manual(duration);
    }

    fn record_failure(&self, duration: Duration) {
        self.record_failure_manual(duration);
    }

    fn is_healthy(&self) -> bool {
        CircuitBreaker::is_healthy(self)
    }

    fn force_open(&self) {
        CircuitBreaker::force_open(self);
    }

    fn force_closed(&self) {
        CircuitBreaker::force_closed(self);
    }

    fn metrics(&self) -> CircuitBreakerMetrics {
        CircuitBreaker::metrics(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_closed() {
        let cb = CircuitBreaker::new("test", CircuitBreakerConfig::default());
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.should_allow());
    }

    #[test]
    fn opens_after_threshold_failures() {
        let cb = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 3,
                ..Default::default()
            },
        );
        cb.record_failure_manual(Duration::ZERO);
        cb.record_failure_manual(Duration::ZERO);
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure_manual(Duration::ZERO);
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.should_allow());
    }

    #[test]
    fn half_open_recovers_after_timeout() {
        let cb = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 1,
                timeout: Duration::ZERO,
                success_threshold: 2,
            },
        );
        cb.record_failure_manual(Duration::ZERO);
        assert_eq!(cb.state(), CircuitState::Open);

        assert!(cb.should_allow()); // transitions to half-open
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_success_manual(Duration::ZERO);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_success_manual(Duration::ZERO);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_reopens() {
        let cb = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 1,
                timeout: Duration::ZERO,
                success_threshold: 2,
            },
        );
        cb.record_failure_manual(Duration::ZERO);
        assert!(cb.should_allow());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_failure_manual(Duration::ZERO);
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn success_resets_consecutive_failures_in_closed_state() {
        let cb = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 5,
                ..Default::default()
            },
        );
        cb.record_failure_manual(Duration::ZERO);
        cb.record_failure_manual(Duration::ZERO);
        assert_eq!(cb.metrics().consecutive_failures, 2);
        cb.record_success_manual(Duration::ZERO);
        assert_eq!(cb.metrics().consecutive_failures, 0);
    }

    #[test]
    fn force_open_and_closed() {
        let cb = CircuitBreaker::new("test", CircuitBreakerConfig::default());
        cb.force_open();
        assert_eq!(cb.state(), CircuitState::Open);
        cb.force_closed();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn behavior_trait_object_dispatch() {
        let cb = CircuitBreaker::new("trait_test", CircuitBreakerConfig::default());
        let behavior: &dyn CircuitBreakerBehavior = &cb;
        assert_eq!(behavior.name(), "trait_test");
        assert!(behavior.should_allow());
    }
}
