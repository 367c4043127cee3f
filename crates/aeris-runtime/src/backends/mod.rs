//! Backend adapter abstractions.
//!
//! A backend is one concrete provider implementation of a capability
//! (AirQo and WAQI both serve "current_air_quality"). The orchestration
//! layer treats every adapter's return value as an opaque success value;
//! payload parsing/normalization lives with each provider integration.
//!
//! ## Security
//!
//! Adapters that need API tokens use the [`secrets`] module so credentials
//! never leak through `Debug` output or logs.

use aeris_core::Arguments;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

mod factory;
#[cfg(feature = "reqwest")]
mod http;
pub mod secrets;

#[cfg(feature = "airqo")]
mod airqo;
#[cfg(feature = "open-meteo")]
mod open_meteo;
#[cfg(feature = "searx")]
mod searx;
#[cfg(feature = "waqi")]
mod waqi;

pub use factory::{AdapterRegistry, BackendFactory};
pub use secrets::{ApiCredential, CredentialSource};

#[cfg(feature = "airqo")]
pub use airqo::{AirqoAdapter, AirqoBackendFactory};
#[cfg(feature = "open-meteo")]
pub use open_meteo::{OpenMeteoAdapter, OpenMeteoBackendFactory};
#[cfg(feature = "searx")]
pub use searx::{SearxAdapter, SearxBackendFactory};
#[cfg(feature = "waqi")]
pub use waqi::{WaqiAdapter, WaqiBackendFactory};

/// Errors from backend adapters.
///
/// These never propagate past the fallback chain as bare `Err`s; the chain
/// folds them into its per-backend failure list.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("response parse error: {0}")]
    Parse(String),

    #[error("authentication failed")]
    Auth,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("backend not configured: {0}")]
    NotConfigured(String),

    #[error("missing argument: {0}")]
    MissingArgument(String),
}

/// Uniform call interface over one external service.
///
/// # Contract
/// - `invoke` is the only suspension point in the orchestration layer;
///   everything around it (dedup, cache, budget, breaker) is non-blocking.
/// - Implementations must be safe to call concurrently.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Call the external service with normalized arguments.
    async fn invoke(&self, arguments: &Arguments) -> Result<JsonValue, BackendError>;

    /// Adapter name for logs and metrics.
    fn name(&self) -> &str;

    /// Check if the backend is reachable.
    async fn health_check(&self) -> bool {
        true
    }
}

impl std::fmt::Debug for dyn BackendAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendAdapter")
            .field("name", &self.name())
            .finish()
    }
}

/// One registered backend: a named adapter serving a capability at a
/// fallback priority.
///
/// Backends are registered at process start and immutable thereafter.
#[derive(Clone)]
pub struct Backend {
    /// Backend name, unique within its capability
    pub name: String,

    /// Capability this backend serves
    pub capability: String,

    /// Fallback priority; lower is tried first
    pub priority: i32,

    /// The adapter
    pub adapter: Arc<dyn BackendAdapter>,
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("name", &self.name)
            .field("capability", &self.capability)
            .field("priority", &self.priority)
            .finish()
    }
}
