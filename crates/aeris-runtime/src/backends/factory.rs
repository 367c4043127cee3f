//! Backend factory pattern for adapter registration.
//!
//! New provider integrations register a factory keyed by a `kind` string;
//! the capability registry resolves each configured backend through this
//! registry at startup. Adding a provider never touches an enum.
//!
//! ## Usage
//!
//! ```ignore
//! let mut registry = AdapterRegistry::new();
//! registry.register(Arc::new(WaqiBackendFactory));
//!
//! let adapter = registry.create("waqi", &backend_config)?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use aeris_core::BackendConfig;

use super::{BackendAdapter, BackendError};

/// Factory for creating backend adapters from configuration.
///
/// Each factory is responsible for:
/// 1. Validating its settings format
/// 2. Creating adapter instances
/// 3. Providing a unique kind identifier
pub trait BackendFactory: Send + Sync {
    /// Unique identifier for this adapter kind.
    ///
    /// Examples: "airqo", "waqi", "open-meteo"
    fn kind(&self) -> &'static str;

    /// Create an adapter from a backend's configuration.
    fn create(&self, config: &BackendConfig) -> Result<Arc<dyn BackendAdapter>, BackendError>;

    /// Validate settings without creating an adapter.
    ///
    /// Used for fast config validation during startup.
    fn validate_settings(&self, config: &BackendConfig) -> Result<(), BackendError> {
        self.create(config).map(|_| ())
    }

    /// Human-readable description of this adapter kind.
    fn description(&self) -> &'static str {
        "Backend adapter"
    }
}

/// Registry of available backend factories.
#[derive(Default)]
pub struct AdapterRegistry {
    factories: BTreeMap<String, Arc<dyn BackendFactory>>,
}

impl AdapterRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory.
    ///
    /// A factory with the same kind replaces the previous one.
    pub fn register(&mut self, factory: Arc<dyn BackendFactory>) {
        self.factories
            .insert(factory.kind().to_string(), factory);
    }

    /// Create an adapter for a configured backend.
    pub fn create(
        &self,
        kind: &str,
        config: &BackendConfig,
    ) -> Result<Arc<dyn BackendAdapter>, BackendError> {
        self.factories
            .get(kind)
            .ok_or_else(|| {
                BackendError::NotConfigured(format!(
                    "unknown backend kind: '{}'. Available: {:?}",
                    kind,
                    self.available_kinds()
                ))
            })?
            .create(config)
    }

    /// Registered kinds, sorted.
    pub fn available_kinds(&self) -> Vec<&str> {
        self.factories.keys().map(|k| k.as_str()).collect()
    }
}
