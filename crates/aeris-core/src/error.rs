//! Error taxonomy for the orchestration layer.

use crate::types::BackendFailure;
use std::time::Duration;
use thiserror::Error;

/// Errors from capability resolution and configuration.
///
/// Backend errors never cross the fallback-chain boundary on their own;
/// they arrive folded into [`OrchestratorError::AllBackendsFailed`].
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Configuration error: a declared capability has no backends.
    /// Fatal at startup validation, never per-request.
    #[error("no backend registered for capability '{capability}'")]
    NoBackendRegistered { capability: String },

    /// Every backend in the chain failed or was circuit-open.
    /// Carries the full per-backend failure list, not just the last one.
    #[error("all backends failed for capability '{capability}': {}", format_attempts(.attempts))]
    AllBackendsFailed {
        capability: String,
        attempts: Vec<BackendFailure>,
    },

    /// The per-invocation deadline elapsed. Recoverable.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Malformed or inconsistent configuration. Fatal at startup.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

fn format_attempts(attempts: &[BackendFailure]) -> String {
    attempts
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
