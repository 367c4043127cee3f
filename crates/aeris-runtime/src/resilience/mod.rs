//! Resilience patterns for the orchestration layer.
//!
//! This module provides:
//! - Per-backend circuit breakers to isolate failing providers
//! - A rolling-window request budget

mod budget;
mod circuit_breaker;

pub use budget::{BudgetStatus, BudgetTracker};
pub use circuit_breaker::{CircuitBreaker, CircuitSnapshot, CircuitState};
