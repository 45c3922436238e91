// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Circuit Breaker
//!
//! Failure isolation for flaky collaborators such as LLM providers. A
//! breaker decorates a fallible async producer: calls flow through while
//! the circuit is closed, are rejected fast while it is open, and a
//! single probe is admitted once the reset timeout elapses (half-open).
//!
//! The registry keys breakers by name; `get_or_create` is idempotent
//! under contention so concurrent stages targeting the same provider
//! share one breaker.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use agent_workflow_domain::WorkflowError;

/// Breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls flow through; failures are counted
    Closed,
    /// Calls are rejected until the reset timeout elapses
    Open,
    /// One probe call is admitted; success closes, failure re-opens
    HalfOpen,
}

/// Configuration for one breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,

    /// Time the circuit stays open before admitting a probe
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// A single named circuit breaker.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    fn new(name: String, config: CircuitBreakerConfig) -> Self {
        Self {
            name,
            config,
            state: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    /// Breaker name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state, accounting for reset-timeout expiry
    pub fn state(&self) -> CircuitState {
        let mut state = self.state.lock();
        self.refresh_locked(&mut state);
        state.state
    }

    fn refresh_locked(&self, state: &mut BreakerState) {
        if state.state == CircuitState::Open {
            let elapsed = state.opened_at.map(|at| at.elapsed()).unwrap_or_default();
            if elapsed >= self.config.reset_timeout {
                debug!(breaker = %self.name, "reset timeout elapsed; admitting a probe");
                state.state = CircuitState::HalfOpen;
            }
        }
    }

    /// Runs the producer through the breaker.
    ///
    /// While open, the producer is not invoked and the call fails with
    /// `WorkflowError::ExecutionFailed`. The producer's own error is
    /// re-raised unchanged after being counted.
    pub async fn call<T, F, Fut>(&self, producer: F) -> Result<T, WorkflowError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, WorkflowError>>,
    {
        {
            let mut state = self.state.lock();
            self.refresh_locked(&mut state);
            if state.state == CircuitState::Open {
                return Err(WorkflowError::execution_failed(format!(
                    "circuit breaker '{}' is open",
                    self.name
                )));
            }
        }

        match producer().await {
            Ok(value) => {
                let mut state = self.state.lock();
                state.consecutive_failures = 0;
                state.opened_at = None;
                state.state = CircuitState::Closed;
                Ok(value)
            }
            Err(err) => {
                let mut state = self.state.lock();
                state.consecutive_failures += 1;
                let tripping = state.state == CircuitState::HalfOpen
                    || state.consecutive_failures >= self.config.failure_threshold;
                if tripping {
                    state.state = CircuitState::Open;
                    state.opened_at = Some(Instant::now());
                    warn!(
                        breaker = %self.name,
                        failures = state.consecutive_failures,
                        "circuit breaker opened"
                    );
                }
                Err(err)
            }
        }
    }
}

/// Keyed registry of circuit breakers.
#[derive(Default)]
pub struct CircuitBreakerRegistry {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the breaker for `name`, creating it on first use.
    ///
    /// Idempotent under contention: concurrent callers for the same name
    /// receive the same breaker instance.
    pub fn get_or_create(&self, name: &str, config: CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.read().get(name) {
            return Arc::clone(existing);
        }
        let mut breakers = self.breakers.write();
        Arc::clone(
            breakers
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(CircuitBreaker::new(name.to_string(), config))),
        )
    }

    /// Number of registered breakers
    pub fn len(&self) -> usize {
        self.breakers.read().len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.breakers.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 2,
            reset_timeout: Duration::from_millis(30),
        }
    }

    #[tokio::test]
    async fn test_success_keeps_circuit_closed() {
        let breaker = CircuitBreaker::new("llm".into(), fast_config());
        let out = breaker.call(|| async { Ok::<_, WorkflowError>(1) }).await.unwrap();
        assert_eq!(out, 1);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_failures_open_circuit_and_reject_fast() {
        let breaker = CircuitBreaker::new("llm".into(), fast_config());

        for _ in 0..2 {
            let _ = breaker
                .call(|| async { Err::<(), _>(WorkflowError::provider_error("down")) })
                .await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        // An open circuit rejects without invoking the producer.
        let invoked = std::sync::atomic::AtomicBool::new(false);
        let result = breaker
            .call(|| {
                invoked.store(true, std::sync::atomic::Ordering::SeqCst);
                async { Ok::<_, WorkflowError>(()) }
            })
            .await;
        assert!(result.is_err());
        assert!(!invoked.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_half_open_probe_closes_on_success() {
        let breaker = CircuitBreaker::new("llm".into(), fast_config());
        for _ in 0..2 {
            let _ = breaker
                .call(|| async { Err::<(), _>(WorkflowError::provider_error("down")) })
                .await;
        }

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.call(|| async { Ok::<_, WorkflowError>(()) }).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_probe_reopens_on_failure() {
        let breaker = CircuitBreaker::new("llm".into(), fast_config());
        for _ in 0..2 {
            let _ = breaker
                .call(|| async { Err::<(), _>(WorkflowError::provider_error("down")) })
                .await;
        }

        tokio::time::sleep(Duration::from_millis(40)).await;
        let _ = breaker
            .call(|| async { Err::<(), _>(WorkflowError::provider_error("still down")) })
            .await;
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_underlying_error_is_reraised() {
        let breaker = CircuitBreaker::new("llm".into(), fast_config());
        let err = breaker
            .call(|| async { Err::<(), _>(WorkflowError::provider_error("http 503")) })
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::ProviderError(_)));
    }

    #[test]
    fn test_registry_get_or_create_is_idempotent() {
        let registry = CircuitBreakerRegistry::new();
        let first = registry.get_or_create("openai", CircuitBreakerConfig::default());
        let second = registry.get_or_create("openai", CircuitBreakerConfig::default());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_under_contention() {
        let registry = Arc::new(CircuitBreakerRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.get_or_create("shared", CircuitBreakerConfig::default()))
            })
            .collect();

        let breakers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(registry.len(), 1);
        for breaker in &breakers[1..] {
            assert!(Arc::ptr_eq(&breakers[0], breaker));
        }
    }
}
