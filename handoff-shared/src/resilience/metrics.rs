//! # Circuit Breaker Metrics
//!
//! Snapshot used for health reporting and the metrics counters named in
//! SPEC_FULL's ambient-stack section ("surfaces via logs and metrics only").

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::state::CircuitState;

/// Point-in-time metrics for a single circuit breaker instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    pub total_calls: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub consecutive_failures: u64,
    pub half_open_calls: u64,
    pub total_duration: Duration,
    pub current_state: CircuitState,
}

impl CircuitBreakerMetrics {
    pub fn new() -> Self {
        Self {
            total_calls: 0,
            success_count: 0,
            failure_count: 0,
            consecutive_failures: 0,
            half_open_calls: 0,
            total_duration: Duration::ZERO,
            current_state: CircuitState::Closed,
        }
    }

    /// Failure rate over the lifetime of the breaker, 0.0 to 1.0.
    pub fn failure_rate(&self) -> f64 {
        if self.total_calls == 0 {
            return 0.0;
        }
        self.failure_count as f64 / self.total_calls as f64
    }

    /// Whether the metrics indicate a healthy component.
    pub fn is_healthy(&self) -> bool {
        match self.current_state {
            CircuitState::Closed => self.failure_rate() < 0.1,
            CircuitState::Open => false,
            CircuitState::HalfOpen => true,
        }
    }

    pub fn format_summary(&self) -> String {
        format!(
            "state={:?} calls={} success={} failures={} failure_rate={:.1}%",
            self.current_state,
            self.total_calls,
            self.success_count,
            self.failure_count,
            self.failure_rate() * 100.0
        )
    }
}

impl Default for CircuitBreakerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_rate_zero_calls_is_zero() {
        assert_eq!(CircuitBreakerMetrics::new().failure_rate(), 0.0);
    }

    #[test]
    fn failure_rate_computed_correctly() {
        let mut metrics = CircuitBreakerMetrics::new();
        metrics.total_calls = 10;
        metrics.failure_count = 3;
        assert!((metrics.failure_rate() - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn open_state_is_never_healthy() {
        let mut metrics = CircuitBreakerMetrics::new();
        metrics.current_state = CircuitState::Open;
        assert!(!metrics.is_healthy());
    }
}
