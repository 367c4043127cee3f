//! # aeris-core
//!
//! Deterministic data model for the Aeris tool orchestration layer.
//!
//! This crate holds everything the async runtime shares but that has no
//! concurrency of its own:
//! - Invocation/result types and the dispatcher's request/response surface
//! - Argument normalization and identity-key derivation
//! - Cache tiers and their TTL defaults
//! - The injected [`Clock`] every time-dependent component reads
//! - Configuration (parsed once at startup, immutable after)
//! - The error taxonomy
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: normalization and identity derivation are pure
//! 2. **No I/O**: nothing here touches the network or the wall clock
//!    (outside [`SystemClock`])
//! 3. **Canonical ordering**: arguments use `BTreeMap`, so identity does
//!    not depend on insertion order

pub mod clock;
pub mod config;
pub mod error;
pub mod normalize;
pub mod tier;
pub mod types;

// Re-export main types at crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    BackendConfig, BudgetConfig, CacheConfig, CapabilityConfig, CircuitBreakerConfig,
    ExecutorConfig, OrchestratorConfig,
};
pub use error::OrchestratorError;
pub use normalize::{identity_key, normalize_arguments, normalize_name};
pub use tier::{CacheTier, TierTtls};
pub use types::{
    Arguments, BackendFailure, InvocationResult, InvocationStatus, Resolution, ToolInvocation,
    ToolRequest, ToolResponse,
};
