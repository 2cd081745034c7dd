//! Circuit breaker state machine states.

/// The three states a circuit breaker cycles through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CircuitState {
    /// Normal operation, all calls pass through.
    Closed,
    /// Failing fast, calls are rejected without attempting the operation.
    Open,
    /// Probing for recovery: a limited number of calls are allowed through.
    HalfOpen,
}

impl From<u8> for CircuitState {
    /// Invalid values default to `Open` — the safest interpretation of
    /// corrupt state is "don't let calls through".
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Closed,
            2 => Self::HalfOpen,
            _ => Self::Open,
        }
    }
}

impl From<CircuitState> for u8 {
    fn from(value: CircuitState) -> Self {
        match value {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}
