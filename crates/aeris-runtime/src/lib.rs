//! # aeris-runtime
//!
//! Tool orchestration and resilience runtime for Aeris.
//!
//! This crate receives the tool-invocation batch an LLM turn produced and
//! executes it against real data providers:
//! - Bounded parallel dispatch with per-invocation deadlines
//! - Per-backend circuit breakers and priority-ordered fallback chains
//! - In-turn deduplication and a tiered-TTL response cache
//! - A rolling-window request budget
//!
//! ## Important
//!
//! One invocation's failure never aborts its siblings, and a batch always
//! returns a complete, input-ordered result set. All time-dependent state
//! (breaker cooldowns, cache TTLs, the budget window) reads the injected
//! [`aeris_core::Clock`], so every resilience path is deterministic under
//! test.
//!
//! ## Example
//!
//! ```rust,ignore
//! use aeris_runtime::{AdapterRegistry, ToolDispatcher};
//! use aeris_core::OrchestratorConfig;
//!
//! let config = OrchestratorConfig::from_yaml_file("aeris.yaml")?;
//! let mut adapters = AdapterRegistry::new();
//! adapters.register(std::sync::Arc::new(aeris_runtime::WaqiBackendFactory));
//!
//! let dispatcher = ToolDispatcher::builder()
//!     .config(config)
//!     .adapters(adapters)
//!     .build()?;
//!
//! let responses = dispatcher.dispatch(&requests).await;
//! ```

pub mod backends;
pub mod cache;
pub mod chain;
pub mod dispatcher;
pub mod executor;
pub mod registry;
pub mod resilience;

// Re-export main types at crate root
pub use backends::{AdapterRegistry, Backend, BackendAdapter, BackendError, BackendFactory};
pub use cache::ResponseCache;
pub use chain::FallbackChain;
pub use dispatcher::{DispatcherHealth, ToolDispatcher, ToolDispatcherBuilder};
pub use executor::{ConcurrentExecutor, ExecutorStats};
pub use registry::{CapabilityRegistry, CapabilityRegistryBuilder};
pub use resilience::{BudgetStatus, BudgetTracker, CircuitBreaker, CircuitSnapshot, CircuitState};

#[cfg(feature = "airqo")]
pub use backends::AirqoBackendFactory;
#[cfg(feature = "open-meteo")]
pub use backends::OpenMeteoBackendFactory;
#[cfg(feature = "searx")]
pub use backends::SearxBackendFactory;
#[cfg(feature = "waqi")]
pub use backends::WaqiBackendFactory;
