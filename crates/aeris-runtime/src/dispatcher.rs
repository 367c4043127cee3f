//! Tool dispatcher: the single entry point for the agent-turn loop.
//!
//! Accepts the raw tool-call list an LLM turn produced (possibly empty,
//! possibly with duplicates), normalizes arguments so identity comparison
//! works, forwards to the executor, and maps results back onto the
//! original request list — one entry per request, original order.
//!
//! This layer never retries: retries are the fallback chain's per-backend
//! attempts plus the circuit breaker's recovery cycle, nothing else.

use std::collections::BTreeMap;
use std::sync::Arc;

use aeris_core::{
    normalize_arguments, normalize_name, Clock, OrchestratorConfig, OrchestratorError,
    SystemClock, ToolInvocation, ToolRequest, ToolResponse,
};

use crate::backends::AdapterRegistry;
use crate::cache::ResponseCache;
use crate::chain::FallbackChain;
use crate::executor::{ConcurrentExecutor, ExecutorStats};
use crate::registry::CapabilityRegistry;
use crate::resilience::{BudgetStatus, BudgetTracker, CircuitBreaker, CircuitSnapshot};

/// Point-in-time orchestrator health, for status reporting.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DispatcherHealth {
    /// Current budget window
    pub budget: BudgetStatus,

    /// Every backend's circuit
    pub circuits: BTreeMap<String, CircuitSnapshot>,

    /// Executor counters since startup
    pub stats: ExecutorStats,
}

/// Top-level orchestration entry point.
///
/// # Architecture
/// - Normalization at this boundary, once
/// - Dedup/cache/budget/parallelism inside [`ConcurrentExecutor`]
/// - Fallback and failure isolation inside [`FallbackChain`]
pub struct ToolDispatcher {
    executor: ConcurrentExecutor,
    budget: Arc<BudgetTracker>,
    breaker: Arc<CircuitBreaker>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ToolDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDispatcher").finish_non_exhaustive()
    }
}

impl ToolDispatcher {
    /// Start building a dispatcher.
    pub fn builder() -> ToolDispatcherBuilder {
        ToolDispatcherBuilder::new()
    }

    /// Dispatch one turn's tool-call requests.
    ///
    /// Returns one response per request, duplicates included, in the
    /// original order. Never panics on a failing backend; every request
    /// settles with a terminal status.
    pub async fn dispatch(&self, requests: &[ToolRequest]) -> Vec<ToolResponse> {
        if requests.is_empty() {
            return Vec::new();
        }

        let requested_at = self.clock.now();
        let invocations: Vec<ToolInvocation> = requests
            .iter()
            .enumerate()
            .map(|(index, request)| ToolInvocation {
                id: format!("inv-{index}"),
                capability: normalize_name(&request.name),
                arguments: normalize_arguments(&request.arguments),
                requested_at,
            })
            .collect();

        tracing::debug!(requests = requests.len(), "dispatching tool batch");
        let results = self.executor.execute_batch(&invocations).await;

        requests
            .iter()
            .zip(results)
            .map(|(request, result)| ToolResponse {
                name: request.name.clone(),
                arguments: request.arguments.clone(),
                status: result.status,
                value: result.value,
                error: result.error,
                backend_used: result.backend_used,
                from_cache: result.from_cache,
            })
            .collect()
    }

    /// Budget, circuit, and executor snapshot.
    pub fn health(&self) -> DispatcherHealth {
        DispatcherHealth {
            budget: self.budget.status(),
            circuits: self.breaker.snapshot(),
            stats: self.executor.stats(),
        }
    }
}

/// Builder wiring the orchestration components together.
pub struct ToolDispatcherBuilder {
    config: OrchestratorConfig,
    registry: Option<CapabilityRegistry>,
    adapters: Option<AdapterRegistry>,
    clock: Option<Arc<dyn Clock>>,
}

impl ToolDispatcherBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: OrchestratorConfig::default(),
            registry: None,
            adapters: None,
            clock: None,
        }
    }

    /// Set the configuration.
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Provide a programmatically built capability registry.
    pub fn registry(mut self, registry: CapabilityRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Provide adapter factories to materialize the configured registry.
    pub fn adapters(mut self, adapters: AdapterRegistry) -> Self {
        self.adapters = Some(adapters);
        self
    }

    /// Inject a clock (tests use [`aeris_core::ManualClock`]).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate configuration and wire the dispatcher.
    ///
    /// Configuration errors (a capability with zero backends, unknown
    /// adapter kind) are fatal here; nothing is ever validated lazily
    /// per-request.
    pub fn build(self) -> Result<ToolDispatcher, OrchestratorError> {
        self.config.validate()?;
        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let registry = match (self.registry, self.adapters) {
            (Some(registry), _) => registry,
            (None, Some(adapters)) => CapabilityRegistry::from_config(&self.config, &adapters)?,
            (None, None) => {
                return Err(OrchestratorError::InvalidConfig(
                    "provide a capability registry or adapter factories".to_string(),
                ))
            }
        };
        let registry = Arc::new(registry);

        let breaker = Arc::new(CircuitBreaker::new(
            registry.backend_names(),
            self.config.circuit_breaker.clone(),
            clock.clone(),
        ));
        let cache = Arc::new(ResponseCache::new(&self.config.cache, clock.clone()));
        let budget = Arc::new(BudgetTracker::new(
            self.config.budget.clone(),
            clock.clone(),
        ));
        let chain = Arc::new(FallbackChain::new(
            registry.clone(),
            breaker.clone(),
            self.config.executor.attempt_timeout,
        ));
        let executor = ConcurrentExecutor::new(
            chain,
            cache,
            budget.clone(),
            registry,
            self.config.executor.clone(),
        );

        Ok(ToolDispatcher {
            executor,
            budget,
            breaker,
            clock,
        })
    }
}

impl Default for ToolDispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{BackendAdapter, BackendError};
    use aeris_core::{Arguments, CacheTier, InvocationStatus};
    use async_trait::async_trait;
    use serde_json::{json, Value as JsonValue};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingAdapter {
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl BackendAdapter for CountingAdapter {
        async fn invoke(&self, arguments: &Arguments) -> Result<JsonValue, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::to_value(arguments).unwrap())
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn dispatcher() -> (ToolDispatcher, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let registry = CapabilityRegistry::builder()
            .capability("current_air_quality", CacheTier::LiveReading)
            .backend(
                "current_air_quality",
                "airqo",
                1,
                Arc::new(CountingAdapter {
                    calls: calls.clone(),
                }),
            )
            .build()
            .unwrap();

        let dispatcher = ToolDispatcher::builder()
            .registry(registry)
            .build()
            .unwrap();
        (dispatcher, calls)
    }

    fn request(name: &str, city: &str) -> ToolRequest {
        let mut arguments = Arguments::new();
        arguments.insert("city".to_string(), json!(city));
        ToolRequest {
            name: name.to_string(),
            arguments,
        }
    }

    #[tokio::test]
    async fn test_empty_dispatch() {
        let (dispatcher, _) = dispatcher();
        assert!(dispatcher.dispatch(&[]).await.is_empty());
    }

    #[tokio::test]
    async fn test_normalization_collapses_cosmetic_differences() {
        let (dispatcher, calls) = dispatcher();
        let requests = vec![
            request("current_air_quality", "Kampala"),
            request("Current_Air_Quality", "  kampala "),
        ];

        let responses = dispatcher.dispatch(&requests).await;

        // One adapter call, two responses in original order
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].status, InvocationStatus::Success);
        assert_eq!(responses[1].status, InvocationStatus::SkippedDuplicate);
        // Original names echoed back, not the normalized ones
        assert_eq!(responses[1].name, "Current_Air_Quality");
    }

    #[tokio::test]
    async fn test_health_snapshot() {
        let (dispatcher, _) = dispatcher();
        dispatcher
            .dispatch(&[request("current_air_quality", "kampala")])
            .await;

        let health = dispatcher.health();
        assert_eq!(health.budget.used, 1);
        assert_eq!(health.circuits["airqo"].state, "closed");
        assert_eq!(health.stats.executions, 1);
    }

    #[test]
    fn test_build_without_registry_fails() {
        let err = ToolDispatcher::builder().build().unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidConfig(_)));
    }
}
