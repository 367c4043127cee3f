//! Batch executor: dedup, cache, budget, bounded parallel dispatch.
//!
//! `execute_batch` settles every invocation in a batch — success, failure,
//! skip, or timeout — and returns results in input order. One invocation's
//! failure never aborts its siblings; isolation is per-invocation.

use crate::cache::ResponseCache;
use crate::chain::FallbackChain;
use crate::registry::CapabilityRegistry;
use crate::resilience::BudgetTracker;
use aeris_core::{
    ExecutorConfig, InvocationResult, InvocationStatus, OrchestratorError, ToolInvocation,
};
use futures::future::join_all;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::time::timeout;

/// Counters over every batch this executor has run.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct ExecutorStats {
    /// Unique identities actually dispatched to a chain
    pub executions: u64,
    /// Dispatched identities that resolved
    pub successes: u64,
    /// Dispatched identities where every backend failed
    pub failures: u64,
    /// Dispatched identities that hit the per-identity deadline
    pub timeouts: u64,
    /// Identities answered from the response cache
    pub cache_hits: u64,
    /// Invocations answered by a sibling's result
    pub dedup_skips: u64,
    /// Identities rejected by the budget window
    pub budget_skips: u64,
}

/// Executes a batch of invocations with bounded parallelism.
pub struct ConcurrentExecutor {
    chain: Arc<FallbackChain>,
    cache: Arc<ResponseCache>,
    budget: Arc<BudgetTracker>,
    registry: Arc<CapabilityRegistry>,
    semaphore: Arc<Semaphore>,
    config: ExecutorConfig,
    stats: RwLock<ExecutorStats>,
}

impl ConcurrentExecutor {
    /// Create an executor over the shared orchestration state.
    pub fn new(
        chain: Arc<FallbackChain>,
        cache: Arc<ResponseCache>,
        budget: Arc<BudgetTracker>,
        registry: Arc<CapabilityRegistry>,
        config: ExecutorConfig,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Self {
            chain,
            cache,
            budget,
            registry,
            semaphore,
            config,
            stats: RwLock::new(ExecutorStats::default()),
        }
    }

    /// Execute a batch; the returned vec has the same length and order as
    /// the input.
    ///
    /// Pipeline per unique identity: cache check, budget admission, then
    /// bounded parallel chain resolution under a per-identity deadline.
    /// Duplicates receive the representative's result with status
    /// `skipped_duplicate`. The call returns only after every unique
    /// identity has settled.
    pub async fn execute_batch(&self, invocations: &[ToolInvocation]) -> Vec<InvocationResult> {
        if invocations.is_empty() {
            return Vec::new();
        }

        let keys: Vec<String> = invocations.iter().map(|inv| inv.identity()).collect();

        // Dedup: first occurrence of an identity is its representative
        let mut representative: HashMap<&str, usize> = HashMap::new();
        let mut duplicate_of: Vec<Option<usize>> = vec![None; invocations.len()];
        for (index, key) in keys.iter().enumerate() {
            match representative.get(key.as_str()) {
                Some(&rep) => duplicate_of[index] = Some(rep),
                None => {
                    representative.insert(key.as_str(), index);
                }
            }
        }

        let mut results: Vec<Option<InvocationResult>> = vec![None; invocations.len()];
        let mut to_dispatch: Vec<usize> = Vec::new();
        let mut cache_hits = 0u64;
        let mut budget_skips = 0u64;

        // Cache and budget run before any worker is spawned; both are
        // non-blocking.
        for (index, invocation) in invocations.iter().enumerate() {
            if duplicate_of[index].is_some() {
                continue;
            }

            // An unknown capability (an LLM-invented tool name) settles here
            // without consuming budget.
            if self.registry.tier(&invocation.capability).is_none() {
                let error = OrchestratorError::NoBackendRegistered {
                    capability: invocation.capability.clone(),
                };
                results[index] = Some(InvocationResult::empty(
                    invocation.id.clone(),
                    InvocationStatus::Failed,
                    Some(error.to_string()),
                ));
                continue;
            }

            if let Some(value) = self.cache.get(&keys[index]) {
                cache_hits += 1;
                results[index] = Some(InvocationResult {
                    invocation_id: invocation.id.clone(),
                    status: InvocationStatus::Success,
                    value: Some(value),
                    error: None,
                    backend_used: None,
                    latency_ms: 0,
                    from_cache: true,
                });
                continue;
            }

            if !self.budget.try_consume(1) {
                budget_skips += 1;
                results[index] = Some(InvocationResult::empty(
                    invocation.id.clone(),
                    InvocationStatus::SkippedBudget,
                    None,
                ));
                continue;
            }

            to_dispatch.push(index);
        }

        // Bounded parallel dispatch of the remaining unique identities
        let dispatched = join_all(to_dispatch.iter().map(|&index| {
            let invocation = &invocations[index];
            let key = &keys[index];
            async move { (index, self.resolve_one(invocation, key).await) }
        }))
        .await;

        let mut executions = 0u64;
        let mut successes = 0u64;
        let mut failures = 0u64;
        let mut timeouts = 0u64;
        for (index, result) in dispatched {
            executions += 1;
            match result.status {
                InvocationStatus::Success => successes += 1,
                InvocationStatus::TimedOut => timeouts += 1,
                _ => failures += 1,
            }
            results[index] = Some(result);
        }

        // Fan the representative's result out to its duplicates
        let mut dedup_skips = 0u64;
        for index in 0..invocations.len() {
            if let Some(rep) = duplicate_of[index] {
                dedup_skips += 1;
                let source = results[rep]
                    .clone()
                    .expect("representative settled before duplicates");
                results[index] = Some(InvocationResult {
                    invocation_id: invocations[index].id.clone(),
                    status: InvocationStatus::SkippedDuplicate,
                    latency_ms: 0,
                    ..source
                });
            }
        }

        {
            let mut stats = self.stats.write();
            stats.executions += executions;
            stats.successes += successes;
            stats.failures += failures;
            stats.timeouts += timeouts;
            stats.cache_hits += cache_hits;
            stats.dedup_skips += dedup_skips;
            stats.budget_skips += budget_skips;
        }

        results
            .into_iter()
            .map(|r| r.expect("every invocation settled"))
            .collect()
    }

    /// Resolve one unique identity under the concurrency ceiling and the
    /// per-identity deadline.
    async fn resolve_one(&self, invocation: &ToolInvocation, key: &str) -> InvocationResult {
        let permit = match self.semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                // Semaphore closed; only possible during shutdown
                return InvocationResult::empty(
                    invocation.id.clone(),
                    InvocationStatus::Failed,
                    Some("executor shut down".to_string()),
                );
            }
        };

        let started = Instant::now();
        let outcome = timeout(
            self.config.call_timeout,
            self.chain.resolve(&invocation.capability, &invocation.arguments),
        )
        .await;
        drop(permit);
        let latency_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(resolution)) => {
                if let Some(tier) = self.registry.tier(&invocation.capability) {
                    self.cache.put(key, resolution.value.clone(), tier);
                }
                InvocationResult {
                    invocation_id: invocation.id.clone(),
                    status: InvocationStatus::Success,
                    value: Some(resolution.value),
                    error: None,
                    backend_used: Some(resolution.backend),
                    latency_ms,
                    from_cache: false,
                }
            }
            Ok(Err(error)) => {
                let mut result = InvocationResult::empty(
                    invocation.id.clone(),
                    InvocationStatus::Failed,
                    Some(error.to_string()),
                );
                result.latency_ms = latency_ms;
                result
            }
            Err(_) => {
                // Best-effort cancellation: the in-flight chain walk is
                // dropped; a still-running network request may complete but
                // its result is discarded.
                let error = OrchestratorError::Timeout(self.config.call_timeout);
                tracing::warn!(
                    capability = %invocation.capability,
                    timeout = ?self.config.call_timeout,
                    "invocation hit per-identity deadline"
                );
                let mut result = InvocationResult::empty(
                    invocation.id.clone(),
                    InvocationStatus::TimedOut,
                    Some(error.to_string()),
                );
                result.latency_ms = latency_ms;
                result
            }
        }
    }

    /// Counters since startup.
    pub fn stats(&self) -> ExecutorStats {
        self.stats.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{BackendAdapter, BackendError};
    use crate::resilience::CircuitBreaker;
    use aeris_core::{
        Arguments, BudgetConfig, CacheConfig, CacheTier, CircuitBreakerConfig, ManualClock,
    };
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::{json, Value as JsonValue};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct CountingAdapter {
        name: String,
        delay: Option<Duration>,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl BackendAdapter for CountingAdapter {
        async fn invoke(&self, _arguments: &Arguments) -> Result<JsonValue, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(json!({"backend": self.name}))
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    struct Harness {
        executor: ConcurrentExecutor,
        clock: Arc<ManualClock>,
        calls: HashMap<String, Arc<AtomicU32>>,
    }

    fn harness(budget_limit: u32, call_timeout: Duration, slow: &[&str]) -> Harness {
        let clock = Arc::new(ManualClock::default());
        let mut calls = HashMap::new();

        let mut builder = CapabilityRegistry::builder()
            .capability("current_air_quality", CacheTier::LiveReading)
            .capability("weather_forecast", CacheTier::Forecast);
        for (capability, backend) in [
            ("current_air_quality", "airqo"),
            ("weather_forecast", "open-meteo"),
        ] {
            let counter = Arc::new(AtomicU32::new(0));
            calls.insert(backend.to_string(), counter.clone());
            let adapter = Arc::new(CountingAdapter {
                name: backend.to_string(),
                delay: slow
                    .contains(&backend)
                    .then_some(Duration::from_secs(5)),
                calls: counter,
            });
            builder = builder.backend(capability, backend, 1, adapter);
        }
        let registry = Arc::new(builder.build().unwrap());

        let breaker = Arc::new(CircuitBreaker::new(
            registry.backend_names(),
            CircuitBreakerConfig::default(),
            clock.clone(),
        ));
        let chain = Arc::new(FallbackChain::new(
            registry.clone(),
            breaker,
            Duration::from_secs(10),
        ));
        let cache = Arc::new(ResponseCache::new(&CacheConfig::default(), clock.clone()));
        let budget = Arc::new(BudgetTracker::new(
            BudgetConfig {
                limit: budget_limit,
                period: Duration::from_secs(60),
            },
            clock.clone(),
        ));

        let executor = ConcurrentExecutor::new(
            chain,
            cache,
            budget,
            registry,
            ExecutorConfig {
                max_concurrency: 5,
                call_timeout,
                attempt_timeout: Duration::from_secs(10),
            },
        );

        Harness {
            executor,
            clock,
            calls,
        }
    }

    fn invocation(id: &str, capability: &str, city: &str) -> ToolInvocation {
        let mut arguments = Arguments::new();
        arguments.insert("city".to_string(), json!(city));
        ToolInvocation {
            id: id.to_string(),
            capability: capability.to_string(),
            arguments,
            requested_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_duplicates_execute_once() {
        let h = harness(10, Duration::from_secs(30), &[]);
        let batch = vec![
            invocation("1", "current_air_quality", "kampala"),
            invocation("2", "current_air_quality", "kampala"),
            invocation("3", "current_air_quality", "kampala"),
        ];

        let results = h.executor.execute_batch(&batch).await;

        assert_eq!(h.calls["airqo"].load(Ordering::SeqCst), 1);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].status, InvocationStatus::Success);
        assert_eq!(results[1].status, InvocationStatus::SkippedDuplicate);
        assert_eq!(results[2].status, InvocationStatus::SkippedDuplicate);
        // Duplicates carry the representative's value
        assert_eq!(results[1].value, results[0].value);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_backend_and_budget() {
        let h = harness(1, Duration::from_secs(30), &[]);
        let batch = vec![invocation("1", "current_air_quality", "kampala")];

        let first = h.executor.execute_batch(&batch).await;
        assert!(!first[0].from_cache);

        // Budget is exhausted (limit 1), but the cache hit does not consume
        let second = h.executor.execute_batch(&batch).await;
        assert_eq!(second[0].status, InvocationStatus::Success);
        assert!(second[0].from_cache);
        assert_eq!(h.calls["airqo"].load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_expiry_triggers_real_call() {
        let h = harness(10, Duration::from_secs(30), &[]);
        let batch = vec![invocation("1", "current_air_quality", "kampala")];

        h.executor.execute_batch(&batch).await;
        h.clock.advance(chrono::Duration::seconds(301));
        let results = h.executor.execute_batch(&batch).await;

        assert!(!results[0].from_cache);
        assert_eq!(h.calls["airqo"].load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_skips() {
        let h = harness(1, Duration::from_secs(30), &[]);
        let batch = vec![
            invocation("1", "current_air_quality", "kampala"),
            invocation("2", "weather_forecast", "kampala"),
        ];

        let results = h.executor.execute_batch(&batch).await;

        let statuses: Vec<_> = results.iter().map(|r| r.status).collect();
        assert!(statuses.contains(&InvocationStatus::Success));
        assert!(statuses.contains(&InvocationStatus::SkippedBudget));

        // After the window rolls over, the capability is admitted again
        h.clock.advance(chrono::Duration::seconds(61));
        let skipped = results
            .iter()
            .position(|r| r.status == InvocationStatus::SkippedBudget)
            .unwrap();
        let retry = h
            .executor
            .execute_batch(std::slice::from_ref(&batch[skipped]))
            .await;
        assert_eq!(retry[0].status, InvocationStatus::Success);
    }

    #[tokio::test]
    async fn test_unknown_capability_fails_without_consuming_budget() {
        let h = harness(1, Duration::from_secs(30), &[]);
        let batch = vec![
            invocation("1", "ocean_temperature", "kampala"),
            invocation("2", "current_air_quality", "kampala"),
        ];

        let results = h.executor.execute_batch(&batch).await;

        assert_eq!(results[0].status, InvocationStatus::Failed);
        assert!(results[0]
            .error
            .as_deref()
            .unwrap()
            .contains("no backend registered"));
        // The single budget unit was still available for the known capability
        assert_eq!(results[1].status, InvocationStatus::Success);
        assert_eq!(h.calls["airqo"].load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_isolated_per_invocation() {
        let h = harness(10, Duration::from_millis(200), &["open-meteo"]);
        let batch = vec![
            invocation("1", "current_air_quality", "kampala"),
            invocation("2", "weather_forecast", "kampala"),
            invocation("3", "current_air_quality", "nairobi"),
        ];

        let results = h.executor.execute_batch(&batch).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].status, InvocationStatus::Success);
        assert_eq!(results[1].status, InvocationStatus::TimedOut);
        assert_eq!(results[2].status, InvocationStatus::Success);
        // Order matches input
        assert_eq!(results[0].invocation_id, "1");
        assert_eq!(results[1].invocation_id, "2");
        assert_eq!(results[2].invocation_id, "3");
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let h = harness(10, Duration::from_secs(30), &[]);
        assert!(h.executor.execute_batch(&[]).await.is_empty());
    }

    #[tokio::test]
    async fn test_stats_accumulate() {
        let h = harness(10, Duration::from_secs(30), &[]);
        let batch = vec![
            invocation("1", "current_air_quality", "kampala"),
            invocation("2", "current_air_quality", "kampala"),
        ];

        h.executor.execute_batch(&batch).await;
        let stats = h.executor.stats();
        assert_eq!(stats.executions, 1);
        assert_eq!(stats.successes, 1);
        assert_eq!(stats.dedup_skips, 1);
    }
}
