//! Fallback chain: priority-ordered backend resolution.
//!
//! Given a capability, try eligible backends in ascending priority order,
//! skipping any whose circuit is open, and treat the first success as
//! final. If everything fails, the terminal error carries every
//! per-backend failure so "which of N providers failed and why" is
//! answerable from one log line.

use crate::backends::BackendError;
use crate::registry::CapabilityRegistry;
use crate::resilience::CircuitBreaker;
use aeris_core::{Arguments, BackendFailure, OrchestratorError, Resolution};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Walks a capability's backend chain under circuit-breaker gating.
pub struct FallbackChain {
    registry: Arc<CapabilityRegistry>,
    breaker: Arc<CircuitBreaker>,
    attempt_timeout: Duration,
}

impl FallbackChain {
    /// Create a chain over the given registry and breaker.
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        breaker: Arc<CircuitBreaker>,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            breaker,
            attempt_timeout,
        }
    }

    /// Resolve a capability to a value.
    ///
    /// Walks backends in priority order; circuit-open backends are skipped
    /// without a network attempt. Every skip and failure lands in the
    /// terminal error's attempt list.
    pub async fn resolve(
        &self,
        capability: &str,
        arguments: &Arguments,
    ) -> Result<Resolution, OrchestratorError> {
        let backends = self.registry.backends(capability).ok_or_else(|| {
            OrchestratorError::NoBackendRegistered {
                capability: capability.to_string(),
            }
        })?;

        let mut attempts = Vec::with_capacity(backends.len());

        for backend in backends {
            if !self.breaker.allow(&backend.name) {
                tracing::debug!(
                    capability = %capability,
                    backend = %backend.name,
                    "skipping backend, circuit open"
                );
                attempts.push(BackendFailure {
                    backend: backend.name.clone(),
                    error: "circuit open".to_string(),
                });
                continue;
            }

            match timeout(self.attempt_timeout, backend.adapter.invoke(arguments)).await {
                Ok(Ok(value)) => {
                    self.breaker.record_success(&backend.name);
                    if !attempts.is_empty() {
                        tracing::info!(
                            capability = %capability,
                            backend = %backend.name,
                            skipped = attempts.len(),
                            "capability resolved by fallback backend"
                        );
                    }
                    return Ok(Resolution {
                        value,
                        backend: backend.name.clone(),
                    });
                }
                Ok(Err(error)) => {
                    self.breaker.record_failure(&backend.name);
                    tracing::warn!(
                        capability = %capability,
                        backend = %backend.name,
                        error = %error,
                        "backend call failed, trying next"
                    );
                    attempts.push(BackendFailure {
                        backend: backend.name.clone(),
                        error: error.to_string(),
                    });
                }
                Err(_) => {
                    self.breaker.record_failure(&backend.name);
                    let error = BackendError::Timeout(self.attempt_timeout);
                    tracing::warn!(
                        capability = %capability,
                        backend = %backend.name,
                        timeout = ?self.attempt_timeout,
                        "backend call timed out, trying next"
                    );
                    attempts.push(BackendFailure {
                        backend: backend.name.clone(),
                        error: error.to_string(),
                    });
                }
            }
        }

        Err(OrchestratorError::AllBackendsFailed {
            capability: capability.to_string(),
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::BackendAdapter;
    use aeris_core::{CacheTier, CircuitBreakerConfig, ManualClock};
    use async_trait::async_trait;
    use serde_json::{json, Value as JsonValue};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedAdapter {
        name: String,
        fail: bool,
        delay: Option<Duration>,
        calls: Arc<AtomicU32>,
    }

    impl ScriptedAdapter {
        fn ok(name: &str) -> (Arc<Self>, Arc<AtomicU32>) {
            Self::build(name, false, None)
        }

        fn failing(name: &str) -> (Arc<Self>, Arc<AtomicU32>) {
            Self::build(name, true, None)
        }

        fn slow(name: &str, delay: Duration) -> (Arc<Self>, Arc<AtomicU32>) {
            Self::build(name, false, Some(delay))
        }

        fn build(name: &str, fail: bool, delay: Option<Duration>) -> (Arc<Self>, Arc<AtomicU32>) {
            let calls = Arc::new(AtomicU32::new(0));
            let adapter = Arc::new(Self {
                name: name.to_string(),
                fail,
                delay,
                calls: calls.clone(),
            });
            (adapter, calls)
        }
    }

    #[async_trait]
    impl BackendAdapter for ScriptedAdapter {
        async fn invoke(&self, _arguments: &Arguments) -> Result<JsonValue, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                Err(BackendError::Http("connection refused".to_string()))
            } else {
                Ok(json!({"backend": self.name}))
            }
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    fn chain_over(
        backends: Vec<(&str, i32, Arc<ScriptedAdapter>)>,
        threshold: u32,
    ) -> (FallbackChain, Arc<CircuitBreaker>) {
        let mut builder =
            CapabilityRegistry::builder().capability("current_air_quality", CacheTier::LiveReading);
        for (name, priority, adapter) in backends {
            builder = builder.backend("current_air_quality", name, priority, adapter);
        }
        let registry = Arc::new(builder.build().unwrap());

        let clock = Arc::new(ManualClock::default());
        let breaker = Arc::new(CircuitBreaker::new(
            registry.backend_names(),
            CircuitBreakerConfig {
                failure_threshold: threshold,
                cooldown: Duration::from_secs(300),
            },
            clock,
        ));

        (
            FallbackChain::new(registry, breaker.clone(), Duration::from_millis(200)),
            breaker,
        )
    }

    #[tokio::test]
    async fn test_first_success_is_final() {
        let (a, a_calls) = ScriptedAdapter::ok("airqo");
        let (b, b_calls) = ScriptedAdapter::ok("waqi");
        let (chain, _) = chain_over(vec![("airqo", 1, a), ("waqi", 2, b)], 5);

        let resolution = chain
            .resolve("current_air_quality", &Arguments::new())
            .await
            .unwrap();
        assert_eq!(resolution.backend, "airqo");
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_falls_through_in_priority_order() {
        let (a, _) = ScriptedAdapter::failing("airqo");
        let (b, b_calls) = ScriptedAdapter::ok("waqi");
        let (chain, breaker) = chain_over(vec![("airqo", 1, a), ("waqi", 2, b)], 5);

        let resolution = chain
            .resolve("current_air_quality", &Arguments::new())
            .await
            .unwrap();
        assert_eq!(resolution.backend, "waqi");
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);

        // The failing backend's breaker counted one failure
        assert!(matches!(
            breaker.state("airqo"),
            Some(crate::resilience::CircuitState::Closed { failures: 1 })
        ));
    }

    #[tokio::test]
    async fn test_open_circuit_skips_without_calling() {
        let (a, a_calls) = ScriptedAdapter::ok("airqo");
        let (b, _) = ScriptedAdapter::ok("waqi");
        let (chain, breaker) = chain_over(vec![("airqo", 1, a), ("waqi", 2, b)], 1);

        // Open airqo's circuit
        breaker.record_failure("airqo");

        let resolution = chain
            .resolve("current_air_quality", &Arguments::new())
            .await
            .unwrap();
        assert_eq!(resolution.backend, "waqi");
        assert_eq!(a_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_failed_carries_every_attempt() {
        let (a, _) = ScriptedAdapter::failing("airqo");
        let (b, _) = ScriptedAdapter::failing("waqi");
        let (chain, _) = chain_over(vec![("airqo", 1, a), ("waqi", 2, b)], 5);

        let err = chain
            .resolve("current_air_quality", &Arguments::new())
            .await
            .unwrap_err();
        match err {
            OrchestratorError::AllBackendsFailed { attempts, .. } => {
                assert_eq!(attempts.len(), 2);
                assert_eq!(attempts[0].backend, "airqo");
                assert_eq!(attempts[1].backend, "waqi");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_attempt_timeout_falls_through() {
        let (a, _) = ScriptedAdapter::slow("airqo", Duration::from_secs(5));
        let (b, _) = ScriptedAdapter::ok("waqi");
        let (chain, breaker) = chain_over(vec![("airqo", 1, a), ("waqi", 2, b)], 5);

        let resolution = chain
            .resolve("current_air_quality", &Arguments::new())
            .await
            .unwrap();
        assert_eq!(resolution.backend, "waqi");
        assert!(matches!(
            breaker.state("airqo"),
            Some(crate::resilience::CircuitState::Closed { failures: 1 })
        ));
    }

    #[tokio::test]
    async fn test_unknown_capability_is_no_backend_registered() {
        let (a, _) = ScriptedAdapter::ok("airqo");
        let (chain, _) = chain_over(vec![("airqo", 1, a)], 5);

        let err = chain.resolve("weather_forecast", &Arguments::new()).await;
        assert!(matches!(
            err,
            Err(OrchestratorError::NoBackendRegistered { ref capability })
                if capability == "weather_forecast"
        ));
    }
}
