//! Circuit breaker: per-backend failure isolation.
//!
//! When a backend fails repeatedly, its circuit opens and the fallback
//! chain skips it without a network attempt until the cooldown elapses.
//! Each backend has its own cell behind its own lock, so unrelated
//! backends never serialize on each other.

use aeris_core::{CircuitBreakerConfig, Clock};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// State of one backend's circuit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation; failures counted
    Closed { failures: u32 },

    /// Calls rejected without a network attempt
    Open { opened_at: DateTime<Utc> },

    /// Cooldown elapsed; exactly one trial call allowed
    HalfOpen { probe_taken: bool },
}

impl CircuitState {
    fn label(&self) -> &'static str {
        match self {
            CircuitState::Closed { .. } => "closed",
            CircuitState::Open { .. } => "open",
            CircuitState::HalfOpen { .. } => "half_open",
        }
    }
}

/// Read-only view of one circuit, for health reporting.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CircuitSnapshot {
    /// "closed", "open", or "half_open"
    pub state: String,

    /// Consecutive failures while closed
    pub consecutive_failures: u32,
}

/// Per-backend circuit breaker.
///
/// The backend set is fixed at startup (backends are immutable after
/// registration), so the cell map is never resized; only the cells
/// themselves mutate, each under its own lock.
pub struct CircuitBreaker {
    cells: HashMap<String, Mutex<CircuitState>>,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    /// Create a breaker with one closed circuit per backend.
    pub fn new(
        backend_names: impl IntoIterator<Item = String>,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cells = backend_names
            .into_iter()
            .map(|name| (name, Mutex::new(CircuitState::Closed { failures: 0 })))
            .collect();

        Self {
            cells,
            config,
            clock,
        }
    }

    fn cooldown(&self) -> ChronoDuration {
        ChronoDuration::from_std(self.config.cooldown).unwrap_or(ChronoDuration::MAX)
    }

    /// Whether a call against this backend may proceed right now.
    ///
    /// Open circuits transition to half-open lazily once the cooldown has
    /// elapsed; the half-open state grants exactly one trial call.
    pub fn allow(&self, backend: &str) -> bool {
        let Some(cell) = self.cells.get(backend) else {
            // Unknown backend: nothing to protect
            return true;
        };

        let mut state = cell.lock();
        match &mut *state {
            CircuitState::Closed { .. } => true,
            CircuitState::Open { opened_at } => {
                if self.clock.now() - *opened_at >= self.cooldown() {
                    *state = CircuitState::HalfOpen { probe_taken: true };
                    tracing::info!(backend = %backend, "circuit half-open, allowing trial call");
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen { probe_taken } => {
                if *probe_taken {
                    false
                } else {
                    *probe_taken = true;
                    true
                }
            }
        }
    }

    /// Record a successful call against a backend.
    pub fn record_success(&self, backend: &str) {
        let Some(cell) = self.cells.get(backend) else {
            return;
        };

        let mut state = cell.lock();
        if matches!(*state, CircuitState::HalfOpen { .. }) {
            tracing::info!(backend = %backend, "circuit closed after successful recovery");
        }
        *state = CircuitState::Closed { failures: 0 };
    }

    /// Record a failed call against a backend.
    pub fn record_failure(&self, backend: &str) {
        let Some(cell) = self.cells.get(backend) else {
            return;
        };

        let mut state = cell.lock();
        match &*state {
            CircuitState::Closed { failures } => {
                let failures = failures + 1;
                if failures >= self.config.failure_threshold {
                    *state = CircuitState::Open {
                        opened_at: self.clock.now(),
                    };
                    tracing::warn!(
                        backend = %backend,
                        failures,
                        "circuit opened after repeated failures"
                    );
                } else {
                    *state = CircuitState::Closed { failures };
                }
            }
            CircuitState::HalfOpen { .. } => {
                // Trial failed; reopen with a fresh cooldown
                *state = CircuitState::Open {
                    opened_at: self.clock.now(),
                };
                tracing::warn!(backend = %backend, "circuit reopened after failed trial");
            }
            CircuitState::Open { .. } => {}
        }
    }

    /// Current state of one circuit.
    pub fn state(&self, backend: &str) -> Option<CircuitState> {
        self.cells.get(backend).map(|cell| cell.lock().clone())
    }

    /// Snapshot of every circuit, for health reporting.
    pub fn snapshot(&self) -> BTreeMap<String, CircuitSnapshot> {
        self.cells
            .iter()
            .map(|(name, cell)| {
                let state = cell.lock();
                let consecutive_failures = match &*state {
                    CircuitState::Closed { failures } => *failures,
                    _ => 0,
                };
                (
                    name.clone(),
                    CircuitSnapshot {
                        state: state.label().to_string(),
                        consecutive_failures,
                    },
                )
            })
            .collect()
    }
}
