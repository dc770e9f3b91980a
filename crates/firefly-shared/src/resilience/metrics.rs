//! # Circuit Breaker Metrics
//!
//! Snapshot metrics for a single circuit breaker instance, suitable for
//! logging, health reporting, and the `costReport`/`health` discovery
//! handlers built on top of the resiliency decorator.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::CircuitState;

/// Metrics for a single circuit breaker instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    pub total_calls: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub consecutive_failures: u64,
    pub slow_call_count: u64,
    pub half_open_calls: u64,
    pub total_duration: Duration,
    pub current_state: CircuitState,
    pub failure_rate: f64,
    pub slow_call_rate: f64,
    pub success_rate: f64,
    pub average_duration: Duration,
}

impl CircuitBreakerMetrics {
    pub fn new() -> Self {
        Self {
            total_calls: 0,
            success_count: 0,
            failure_count: 0,
            consecutive_failures: 0,
            slow_call_count: 0,
            half_open_calls: 0,
            total_duration: Duration::ZERO,
            current_state: CircuitState::Closed,
            failure_rate: 0.0,
            slow_call_rate: 0.0,
            success_rate: 0.0,
            average_duration: Duration::ZERO,
        }
    }

    pub fn is_healthy(&self) -> bool {
        match self.current_state {
            CircuitState::Closed => self.failure_rate < 0.1,
            CircuitState::Open => false,
            CircuitState::HalfOpen => true,
        }
    }

    pub fn state_description(&self) -> &'static str {
        match self.current_state {
            CircuitState::Closed => "Healthy - Normal operation",
            CircuitState::Open => "Failing - Rejecting all calls",
            CircuitState::HalfOpen => "Recovering - Testing system health",
        }
    }

    pub fn format_summary(&self) -> String {
        format!(
            "State: {} | Calls: {} | Success: {:.1}% | Failures: {} | Avg Duration: {:.2}ms",
            self.state_description(),
            self.total_calls,
            self.success_rate * 100.0,
            self.failure_count,
            self.average_duration.as_millis()
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
    fn new_metrics_start_healthy_closed() {
        let m = CircuitBreakerMetrics::new();
        assert!(m.is_healthy());
        assert_eq!(m.current_state, CircuitState::Closed);
    }

    #[test]
    fn open_state_is_never_healthy() {
        let mut m = CircuitBreakerMetrics::new();
        m.current_state = CircuitState::Open;
        assert!(!m.is_healthy());
    }

    #[test]
    fn half_open_counts_as_healthy() {
        let mut m = CircuitBreakerMetrics::new();
        m.current_state = CircuitState::HalfOpen;
        assert!(m.is_healthy());
    }

    #[test]
    fn closed_with_high_failure_rate_is_unhealthy() {
        let mut m = CircuitBreakerMetrics::new();
        m.failure_rate = 0.5;
        assert!(!m.is_healthy());
    }
}
