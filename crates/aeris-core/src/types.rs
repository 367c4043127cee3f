//! Core types shared across the orchestration layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// Tool-call arguments as an ordered mapping.
///
/// `BTreeMap` (not `HashMap`) so that key order is canonical and two
/// argument sets built in different insertion orders compare equal.
pub type Arguments = BTreeMap<String, JsonValue>;

/// One requested tool call, as produced by an LLM turn.
///
/// Identity is `(capability, normalized arguments)`; two invocations with
/// the same identity within one dispatch batch are duplicates. Created by
/// the agent-turn loop per LLM tool-call; consumed exactly once by the
/// executor; not persisted beyond the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Unique id within the batch
    pub id: String,

    /// Capability this invocation asks for (e.g., "current_air_quality")
    pub capability: String,

    /// Normalized arguments
    pub arguments: Arguments,

    /// When the agent-turn loop created this invocation
    pub requested_at: DateTime<Utc>,
}

impl ToolInvocation {
    /// The invocation's identity key within a batch.
    ///
    /// Also used as the cache key for the capability's response.
    pub fn identity(&self) -> String {
        crate::normalize::identity_key(&self.capability, &self.arguments)
    }
}

/// Terminal status of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStatus {
    /// A backend (or the cache) produced a value
    Success,

    /// Every eligible backend failed or was circuit-open
    Failed,

    /// Another invocation in the batch shares this identity
    SkippedDuplicate,

    /// The rolling-window budget would be exceeded
    SkippedBudget,

    /// The per-invocation deadline elapsed
    TimedOut,
}

impl InvocationStatus {
    /// Whether this status carries a usable value.
    pub fn is_success(&self) -> bool {
        matches!(self, InvocationStatus::Success)
    }
}

impl fmt::Display for InvocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InvocationStatus::Success => "success",
            InvocationStatus::Failed => "failed",
            InvocationStatus::SkippedDuplicate => "skipped_duplicate",
            InvocationStatus::SkippedBudget => "skipped_budget",
            InvocationStatus::TimedOut => "timed_out",
        };
        write!(f, "{}", s)
    }
}

/// Settled outcome of one invocation.
///
/// Produced once per unique identity and fanned out to every duplicate
/// sharing that identity within the same batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationResult {
    /// Id of the invocation this result answers
    pub invocation_id: String,

    /// Terminal status
    pub status: InvocationStatus,

    /// Opaque success value (present iff the identity resolved)
    pub value: Option<JsonValue>,

    /// Error description (present on Failed / TimedOut)
    pub error: Option<String>,

    /// Backend that produced the value, if any
    pub backend_used: Option<String>,

    /// Wall time spent resolving this identity; 0 for duplicates and cache hits
    pub latency_ms: u64,

    /// Whether the value came from the response cache
    pub from_cache: bool,
}

impl InvocationResult {
    /// A result carrying a resolved value.
    pub fn success(invocation_id: impl Into<String>, value: JsonValue, backend: &str) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            status: InvocationStatus::Success,
            value: Some(value),
            error: None,
            backend_used: Some(backend.to_string()),
            latency_ms: 0,
            from_cache: false,
        }
    }

    /// A result with no value, for the given terminal status.
    pub fn empty(
        invocation_id: impl Into<String>,
        status: InvocationStatus,
        error: Option<String>,
    ) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            status,
            value: None,
            error,
            backend_used: None,
            latency_ms: 0,
            from_cache: false,
        }
    }
}

/// A raw tool-call request, as the agent-turn loop hands it over.
///
/// Arguments here are un-normalized; the dispatcher normalizes them before
/// identity comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Requested capability name
    pub name: String,

    /// Raw arguments
    #[serde(default)]
    pub arguments: Arguments,
}

/// Response entry the dispatcher returns per original request.
///
/// One entry per original request, duplicates included, original order
/// preserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    /// Original requested name
    pub name: String,

    /// Original arguments
    pub arguments: Arguments,

    /// Terminal status
    pub status: InvocationStatus,

    /// Opaque success value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<JsonValue>,

    /// Error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Backend that produced the value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_used: Option<String>,

    /// Whether the value came from the response cache
    pub from_cache: bool,
}

/// Successful resolution of a capability by a fallback chain.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The backend's opaque success value
    pub value: JsonValue,

    /// Name of the backend that produced it
    pub backend: String,
}

/// One backend's failure inside a fallback chain walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendFailure {
    /// Backend that failed or was skipped
    pub backend: String,

    /// Why it did not produce a value
    pub error: String,
}

impl fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.backend, self.error)
    }
}
