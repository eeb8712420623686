//! Per-provider circuit breaker: Closed / Open / Half-Open, keyed by
//! adapter name in a registry the router consults before every call.

use crate::config::CircuitBreakerConfig;
use crate::utils::metrics::METRICS;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

fn gauge_value(state: CircuitState) -> f64 {
    match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    }
}

struct Breaker {
    config: CircuitBreakerConfig,
    state: Mutex<CircuitState>,
    failure_count: AtomicU32,
    success_count: AtomicU32,
    request_count: AtomicU32,
    half_open_probes: AtomicU32,
    last_failure: Mutex<Option<Instant>>,
    window_start: Mutex<Instant>,
}

impl Breaker {
    fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(CircuitState::Closed),
            failure_count: AtomicU32::new(0),
            success_count: AtomicU32::new(0),
            request_count: AtomicU32::new(0),
            half_open_probes: AtomicU32::new(0),
            last_failure: Mutex::new(None),
            window_start: Mutex::new(Instant::now()),
        }
    }

    fn record_state_metric(&self, provider: &str, state: CircuitState) {
        METRICS
            .circuit_breaker_state
            .with_label_values(&[provider])
            .set(gauge_value(state));
    }

    /// In `HalfOpen`, only `probe_count` calls are let through; once that
    /// many probes are outstanding, further callers are rejected until a
    /// probe resolves the state one way or the other.
    fn can_execute(&self, provider: &str) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        match *state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => {
                let taken = self.half_open_probes.fetch_add(1, Ordering::Relaxed);
                if taken < self.config.probe_count {
                    true
                } else {
                    self.half_open_probes.fetch_sub(1, Ordering::Relaxed);
                    false
                }
            }
            CircuitState::Open => {
                let open_duration = Duration::from_secs(self.config.open_duration_seconds);
                let elapsed_enough = self
                    .last_failure
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .map(|t| t.elapsed() >= open_duration)
                    .unwrap_or(false);
                if elapsed_enough {
                    debug!(provider, "circuit breaker open -> half-open");
                    *state = CircuitState::HalfOpen;
                    self.success_count.store(0, Ordering::Relaxed);
                    self.request_count.store(0, Ordering::Relaxed);
                    self.half_open_probes.store(1, Ordering::Relaxed);
                    self.record_state_metric(provider, CircuitState::HalfOpen);
                    true
                } else {
                    false
                }
            }
        }
    }

    fn on_success(&self, provider: &str) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        if *state == CircuitState::HalfOpen {
            let successes = self.success_count.fetch_add(1, Ordering::Relaxed) + 1;
            if successes >= self.config.success_threshold {
                debug!(provider, "circuit breaker half-open -> closed");
                *state = CircuitState::Closed;
                self.failure_count.store(0, Ordering::Relaxed);
                self.success_count.store(0, Ordering::Relaxed);
                self.half_open_probes.store(0, Ordering::Relaxed);
                self.record_state_metric(provider, CircuitState::Closed);
            }
        } else {
            self.failure_count.store(0, Ordering::Relaxed);
        }
    }

    fn on_failure(&self, provider: &str) {
        *self.last_failure.lock().unwrap_or_else(|p| p.into_inner()) = Some(Instant::now());

        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());

        if *state == CircuitState::HalfOpen {
            warn!(provider, "circuit breaker half-open -> open on probe failure");
            *state = CircuitState::Open;
            self.half_open_probes.store(0, Ordering::Relaxed);
            self.record_state_metric(provider, CircuitState::Open);
            return;
        }

        {
            let mut window_start = self.window_start.lock().unwrap_or_else(|p| p.into_inner());
            let window = Duration::from_secs(self.config.window_seconds);
            if window_start.elapsed() >= window {
                *window_start = Instant::now();
                self.failure_count.store(0, Ordering::Relaxed);
                self.request_count.store(0, Ordering::Relaxed);
            }
        }

        let failures = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        let requests = self.request_count.fetch_add(1, Ordering::Relaxed) + 1;

        if requests >= self.config.min_requests
            && failures >= self.config.failure_threshold
            && *state != CircuitState::Open
        {
            warn!(provider, failures, requests, "circuit breaker closed -> open");
            *state = CircuitState::Open;
            self.record_state_metric(provider, CircuitState::Open);
        }
    }

    fn record_attempt(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    fn state(&self) -> CircuitState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Registry of per-provider breakers, created lazily on first observation
/// of a provider name.
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: DashMap<String, Breaker>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    fn entry(&self, provider: &str) -> dashmap::mapref::one::Ref<'_, String, Breaker> {
        if !self.breakers.contains_key(provider) {
            self.breakers
                .entry(provider.to_string())
                .or_insert_with(|| Breaker::new(self.config.clone()));
        }
        self.breakers.get(provider).expect("just inserted")
    }

    /// Whether a call to `provider` is currently permitted. A
    /// breaker-short-circuited call is indistinguishable to the router
    /// from an upstream error: the caller maps a `false` here onto
    /// `provider_unavailable` and moves to the next candidate.
    pub fn can_execute(&self, provider: &str) -> bool {
        self.entry(provider).can_execute(provider)
    }

    pub fn record_success(&self, provider: &str) {
        self.entry(provider).on_success(provider);
    }

    pub fn record_failure(&self, provider: &str) {
        self.entry(provider).on_failure(provider);
    }

    pub fn record_attempt(&self, provider: &str) {
        self.entry(provider).record_attempt();
    }

    pub fn state_of(&self, provider: &str) -> CircuitState {
        self.entry(provider).state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            success_threshold: 2,
            min_requests: 3,
            window_seconds: 60,
            open_duration_seconds: 30,
            probe_count: 3,
        }
    }

    #[test]
    fn starts_closed_and_permits_calls() {
        let reg = CircuitBreakerRegistry::new(config());
        assert!(reg.can_execute("openai"));
        assert_eq!(reg.state_of("openai"), CircuitState::Closed);
    }

    #[test]
    fn opens_after_reaching_failure_threshold() {
        let reg = CircuitBreakerRegistry::new(config());
        for _ in 0..3 {
            reg.record_attempt("openai");
            reg.record_failure("openai");
        }
        assert_eq!(reg.state_of("openai"), CircuitState::Open);
        assert!(!reg.can_execute("openai"));
    }

    #[test]
    fn success_resets_failure_count_while_closed() {
        let reg = CircuitBreakerRegistry::new(config());
        reg.record_attempt("openai");
        reg.record_failure("openai");
        reg.record_success("openai");
        reg.record_attempt("openai");
        reg.record_failure("openai");
        reg.record_attempt("openai");
        reg.record_failure("openai");
        // Only two consecutive failures since the reset — below threshold.
        assert_eq!(reg.state_of("openai"), CircuitState::Closed);
    }

    #[test]
    fn half_open_probe_failure_reopens_immediately() {
        let reg = CircuitBreakerRegistry::new(CircuitBreakerConfig {
            open_duration_seconds: 0,
            ..config()
        });
        for _ in 0..3 {
            reg.record_attempt("openai");
            reg.record_failure("openai");
        }
        assert!(reg.can_execute("openai")); // transitions to half-open
        assert_eq!(reg.state_of("openai"), CircuitState::HalfOpen);
        reg.record_failure("openai");
        assert_eq!(reg.state_of("openai"), CircuitState::Open);
    }

    #[test]
    fn half_open_reaching_success_threshold_closes() {
        let reg = CircuitBreakerRegistry::new(CircuitBreakerConfig {
            open_duration_seconds: 0,
            ..config()
        });
        for _ in 0..3 {
            reg.record_attempt("openai");
            reg.record_failure("openai");
        }
        assert!(reg.can_execute("openai"));
        reg.record_success("openai");
        reg.record_success("openai");
        assert_eq!(reg.state_of("openai"), CircuitState::Closed);
    }
}
