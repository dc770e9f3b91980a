//! # Circuit Breaker (§4.1)
//!
//! Sliding-window circuit breaker: CLOSED → OPEN when the failure rate or
//! slow-call rate over the last `sliding_window_size` outcomes exceeds their
//! thresholds (once at least `minimum_number_of_calls` samples exist) → OPEN
//! short-circuits every call until `wait_duration_in_open_state` elapses →
//! HALF_OPEN admits up to `permitted_number_of_calls_in_half_open_state`
//! probes, closing on an unbroken run of successes or reopening on the first
//! failure.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::metrics::CircuitBreakerMetrics;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Unified interface for circuit breaker implementations, so callers that
/// only need pre-flight/record access can work with `&dyn CircuitBreakerBehavior`.
pub trait CircuitBreakerBehavior: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;
    fn state(&self) -> CircuitState;
    fn should_allow(&self) -> bool;
    fn record_success(&self, duration: Duration);
    fn record_failure(&self, duration: Duration);
    fn is_healthy(&self) -> bool;
    fn force_open(&self);
    fn force_closed(&self);
    fn metrics(&self) -> CircuitBreakerMetrics;
}

/// Circuit breaker configuration (§6 `resiliency.circuit-breaker.*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_rate_threshold: f64,
    pub slow_call_rate_threshold: f64,
    pub slow_call_duration_threshold: Duration,
    pub wait_duration_in_open_state: Duration,
    pub permitted_number_of_calls_in_half_open_state: usize,
    pub sliding_window_size: usize,
    pub minimum_number_of_calls: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 50.0,
            slow_call_rate_threshold: 100.0,
            slow_call_duration_threshold: Duration::from_secs(60),
            wait_duration_in_open_state: Duration::from_secs(60),
            permitted_number_of_calls_in_half_open_state: 10,
            sliding_window_size: 100,
            minimum_number_of_calls: 10,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Outcome {
    success: bool,
    slow: bool,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    window: VecDeque<Outcome>,
    total_calls: u64,
    total_duration: Duration,
    consecutive_failures: u64,
    opened_at: Option<Instant>,
    half_open_attempts: usize,
    half_open_successes: usize,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            window: VecDeque::new(),
            total_calls: 0,
            total_duration: Duration::ZERO,
            consecutive_failures: 0,
            opened_at: None,
            half_open_attempts: 0,
            half_open_successes: 0,
        }
    }
}

/// Generic sliding-window circuit breaker shared per `(providerName,
/// operationId|"_enrich")` key by the resiliency decorator.
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

    fn record(&self, success: bool, duration: Duration) {
        let slow = duration > self.config.slow_call_duration_threshold;
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        inner.total_calls += 1;
        inner.total_duration += duration;

        match inner.state {
            CircuitState::Closed => {
                if success {
                    inner.consecutive_failures = 0;
                } else {
                    inner.consecutive_failures += 1;
                }
                inner.window.push_back(Outcome { success, slow });
                while inner.window.len() > self.config.sliding_window_size {
                    inner.window.pop_front();
                }
                self.maybe_open_from_closed(&mut inner);
            }
            CircuitState::HalfOpen => {
                inner.half_open_attempts += 1;
                if success {
                    inner.half_open_successes += 1;
                    if inner.half_open_successes
                        >= self.config.permitted_number_of_calls_in_half_open_state
                    {
                        self.transition_to_closed(&mut inner);
                    }
                } else {
                    self.transition_to_open(&mut inner);
                }
            }
            CircuitState::Open => {
                // A call that slipped through (e.g. the transition race) is
                // still recorded for observability but doesn't change state.
            }
        }
    }

    fn maybe_open_from_closed(&self, inner: &mut Inner) {
        if inner.window.len() < self.config.minimum_number_of_calls {
            return;
        }
        let total = inner.window.len() as f64;
        let failures = inner.window.iter().filter(|o| !o.success).count() as f64;
        let slow = inner.window.iter().filter(|o| o.slow).count() as f64;
        let failure_rate = (failures / total) * 100.0;
        let slow_rate = (slow / total) * 100.0;
        if failure_rate > self.config.failure_rate_threshold
            || slow_rate > self.config.slow_call_rate_threshold
        {
            self.transition_to_open(inner);
        }
    }

    fn transition_to_open(&self, inner: &mut Inner) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
        inner.half_open_attempts = 0;
        inner.half_open_successes = 0;
    }

    fn transition_to_half_open(&self, inner: &mut Inner) {
        inner.state = CircuitState::HalfOpen;
        inner.half_open_attempts = 0;
        inner.half_open_successes = 0;
    }

    fn transition_to_closed(&self, inner: &mut Inner) {
        inner.state = CircuitState::Closed;
        inner.window.clear();
        inner.opened_at = None;
        inner.consecutive_failures = 0;
        inner.half_open_attempts = 0;
        inner.half_open_successes = 0;
    }

    fn metrics_from(&self, inner: &Inner) -> CircuitBreakerMetrics {
        let success_count = inner.window.iter().filter(|o| o.success).count() as u64;
        let failure_count = inner.window.iter().filter(|o| !o.success).count() as u64;
        let slow_call_count = inner.window.iter().filter(|o| o.slow).count() as u64;
        let total = inner.window.len().max(1) as f64;
        CircuitBreakerMetrics {
            total_calls: inner.total_calls,
            success_count,
            failure_count,
            consecutive_failures: inner.consecutive_failures,
            slow_call_count,
            half_open_calls: inner.half_open_attempts as u64,
            total_duration: inner.total_duration,
            current_state: inner.state,
            failure_rate: failure_count as f64 / total,
            slow_call_rate: slow_call_count as f64 / total,
            success_rate: success_count as f64 / total,
            average_duration: if inner.total_calls == 0 {
                Duration::ZERO
            } else {
                inner.total_duration / inner.total_calls as u32
            },
        }
    }
}

impl CircuitBreakerBehavior for CircuitBreaker {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> CircuitState {
        self.inner.lock().expect("circuit breaker mutex poisoned").state
    }

    fn should_allow(&self) -> bool {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => {
                inner.half_open_attempts < self.config.permitted_number_of_calls_in_half_open_state
            }
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.config.wait_duration_in_open_state {
                    self.transition_to_half_open(&mut inner);
                    true
                } else {
                    false
                }
            }
        }
    }

    fn record_success(&self, duration: Duration) {
        self.record(true, duration);
    }

    fn record_failure(&self, duration: Duration) {
        self.record(false, duration);
    }

    fn is_healthy(&self) -> bool {
        self.metrics().is_healthy()
    }

    fn force_open(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        self.transition_to_open(&mut inner);
    }

    fn force_closed(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        self.transition_to_closed(&mut inner);
    }

    fn metrics(&self) -> CircuitBreakerMetrics {
        let inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        self.metrics_from(&inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                minimum_number_of_calls: 4,
                sliding_window_size: 4,
                wait_duration_in_open_state: Duration::from_millis(20),
                permitted_number_of_calls_in_half_open_state: 2,
                ..Default::default()
            },
        )
    }

    #[test]
    fn starts_closed_and_allows_calls() {
        let cb = breaker();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.should_allow());
    }

    #[test]
    fn opens_after_failure_rate_exceeds_threshold() {
        let cb = breaker();
        for _ in 0..3 {
            cb.record_failure(Duration::from_millis(1));
        }
        cb.record_success(Duration::from_millis(1));
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.should_allow());
    }

    #[test]
    fn transitions_to_half_open_after_wait_duration() {
        let cb = breaker();
        for _ in 0..4 {
            cb.record_failure(Duration::from_millis(1));
        }
        assert_eq!(cb.state(), CircuitState::Open);
        std::thread::sleep(Duration::from_millis(30));
        assert!(cb.should_allow());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn half_open_closes_after_successful_probes() {
        let cb = breaker();
        for _ in 0..4 {
            cb.record_failure(Duration::from_millis(1));
        }
        std::thread::sleep(Duration::from_millis(30));
        assert!(cb.should_allow());
        cb.record_success(Duration::from_millis(1));
        cb.record_success(Duration::from_millis(1));
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_reopens_on_failure() {
        let cb = breaker();
        for _ in 0..4 {
            cb.record_failure(Duration::from_millis(1));
        }
        std::thread::sleep(Duration::from_millis(30));
        assert!(cb.should_allow());
        cb.record_failure(Duration::from_millis(1));
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn force_open_and_force_closed_override_state() {
        let cb = breaker();
        cb.force_open();
        assert_eq!(cb.state(), CircuitState::Open);
        cb.force_closed();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn slow_calls_open_circuit_via_slow_call_rate() {
        let cb = CircuitBreaker::new(
            "slow",
            CircuitBreakerConfig {
                minimum_number_of_calls: 2,
                sliding_window_size: 2,
                slow_call_duration_threshold: Duration::from_millis(5),
                slow_call_rate_threshold: 50.0,
                ..Default::default()
            },
        );
        cb.record_success(Duration::from_millis(10));
        cb.record_success(Duration::from_millis(10));
        assert_eq!(cb.state(), CircuitState::Open);
    }
}
