use std::{
    future::Future,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use anyhow::{Error, Result, anyhow};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::models::circuit_breaker::{CircuitBreakerConfig, CircuitState};

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failures: u32,
    successes: u32,
    opened_at: Option<Instant>,
}

/// Per-backend breaker. State lives in process memory; each channel service
/// owns exactly one.
#[derive(Debug)]
pub struct CircuitBreaker {
    service_name: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(service_name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let service_name = service_name.into();
        debug!(service = %service_name, "Circuit breaker initialized");

        Self {
            service_name,
            config,
            state: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failures: 0,
                successes: 0,
                opened_at: None,
            }),
        }
    }

    pub async fn call<F, Fut, T>(&self, operation: F) -> Result<T, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        self.admit()?;

        match operation().await {
            Ok(result) => {
                self.record_success();
                Ok(result)
            }
            Err(e) => {
                self.record_failure();
                Err(e)
            }
        }
    }

    /// Current state, moving an expired open breaker to half-open first.
    pub fn state(&self) -> CircuitState {
        let mut guard = self.lock();
        self.refresh(&mut guard);
        guard.state
    }

    fn admit(&self) -> Result<(), Error> {
        let mut guard = self.lock();
        self.refresh(&mut guard);

        match guard.state {
            CircuitState::Open => {
                warn!(service = %self.service_name, "Circuit breaker is open, rejecting request");
                Err(anyhow!("Circuit breaker is open for {}", self.service_name))
            }
            CircuitState::HalfOpen => {
                debug!(service = %self.service_name, "Circuit breaker in half-open state");
                Ok(())
            }
            CircuitState::Closed => Ok(()),
        }
    }

    fn refresh(&self, guard: &mut MutexGuard<'_, BreakerState>) {
        if guard.state != CircuitState::Open {
            return;
        }

        let timeout = Duration::from_secs(self.config.timeout_seconds);
        let expired = guard
            .opened_at
            .is_some_and(|opened_at| opened_at.elapsed() >= timeout);

        if expired {
            info!(service = %self.service_name, "Circuit breaker attempting reset");
            guard.state = CircuitState::HalfOpen;
            guard.successes = 0;
        }
    }

    fn record_success(&self) {
        let mut guard = self.lock();

        match guard.state {
            CircuitState::HalfOpen => {
                guard.successes += 1;
                debug!(
                    service = %self.service_name,
                    successes = guard.successes,
                    threshold = self.config.success_threshold,
                    "Circuit breaker success recorded"
                );

                if guard.successes >= self.config.success_threshold {
                    guard.state = CircuitState::Closed;
                    guard.failures = 0;
                    guard.successes = 0;
                    guard.opened_at = None;
                    info!(service = %self.service_name, "Circuit breaker closed after successful recovery");
                }
            }
            CircuitState::Closed => guard.failures = 0,
            CircuitState::Open => {}
        }
    }

    fn record_failure(&self) {
        let mut guard = self.lock();

        if guard.state == CircuitState::HalfOpen {
            guard.state = CircuitState::Open;
            guard.opened_at = Some(Instant::now());
            warn!(service = %self.service_name, "Circuit breaker reopened after failed recovery attempt");
            return;
        }

        guard.failures += 1;
        debug!(
            service = %self.service_name,
            failures = guard.failures,
            threshold = self.config.failure_threshold,
            "Circuit breaker failure recorded"
        );

        if guard.state == CircuitState::Closed && guard.failures >= self.config.failure_threshold {
            guard.state = CircuitState::Open;
            guard.opened_at = Some(Instant::now());
            warn!(
                service = %self.service_name,
                failures = guard.failures,
                "Circuit breaker opened due to consecutive failures"
            );
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
