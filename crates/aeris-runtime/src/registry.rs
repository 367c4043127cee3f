//! Capability registry.
//!
//! Maps each capability to its cache tier and its priority-ordered
//! fallback chain. Built once at startup (from config via the adapter
//! factories, or programmatically via the builder) and immutable after;
//! the fallback order is statically auditable.

use crate::backends::{AdapterRegistry, Backend, BackendAdapter};
use aeris_core::{normalize_name, CacheTier, OrchestratorConfig, OrchestratorError};
use std::collections::HashMap;
use std::sync::Arc;

struct CapabilityEntry {
    tier: CacheTier,
    /// Sorted by priority ascending; equal priorities keep registration order
    backends: Vec<Backend>,
}

/// Immutable post-startup view of every capability the system supports.
pub struct CapabilityRegistry {
    entries: HashMap<String, CapabilityEntry>,
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("capabilities", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CapabilityRegistry {
    /// Start building a registry programmatically.
    pub fn builder() -> CapabilityRegistryBuilder {
        CapabilityRegistryBuilder::default()
    }

    /// Build from configuration, resolving adapters through the factories.
    pub fn from_config(
        config: &OrchestratorConfig,
        adapters: &AdapterRegistry,
    ) -> Result<Self, OrchestratorError> {
        config.validate()?;

        let mut builder = Self::builder();
        for capability in &config.capabilities {
            builder = builder.capability(&capability.name, capability.tier);
            for backend in &capability.backends {
                let adapter = adapters.create(&backend.kind, backend).map_err(|e| {
                    OrchestratorError::InvalidConfig(format!(
                        "backend '{}' for capability '{}': {}",
                        backend.name, capability.name, e
                    ))
                })?;
                builder =
                    builder.backend(&capability.name, &backend.name, backend.priority, adapter);
            }
        }
        builder.build()
    }

    /// The fallback chain for a capability, in try order.
    pub fn backends(&self, capability: &str) -> Option<&[Backend]> {
        self.entries
            .get(capability)
            .map(|entry| entry.backends.as_slice())
    }

    /// The cache tier a capability declared.
    pub fn tier(&self, capability: &str) -> Option<CacheTier> {
        self.entries.get(capability).map(|entry| entry.tier)
    }

    /// Every registered backend name, for breaker-cell allocation.
    pub fn backend_names(&self) -> Vec<String> {
        self.entries
            .values()
            .flat_map(|entry| entry.backends.iter().map(|b| b.name.clone()))
            .collect()
    }

    /// Registered capability names.
    pub fn capability_names(&self) -> Vec<&str> {
        self.entries.keys().map(|k| k.as_str()).collect()
    }
}

/// Builder for programmatic registration (tests, embedded use).
#[derive(Default)]
pub struct CapabilityRegistryBuilder {
    entries: HashMap<String, CapabilityEntry>,
    order: Vec<String>,
}

impl CapabilityRegistryBuilder {
    /// Declare a capability with its cache tier.
    pub fn capability(mut self, name: &str, tier: CacheTier) -> Self {
        let name = normalize_name(name);
        if !self.entries.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.entries.insert(
            name,
            CapabilityEntry {
                tier,
                backends: Vec::new(),
            },
        );
        self
    }

    /// Register a backend for a declared capability.
    ///
    /// Registration order is preserved for equal priorities.
    pub fn backend(
        mut self,
        capability: &str,
        name: &str,
        priority: i32,
        adapter: Arc<dyn BackendAdapter>,
    ) -> Self {
        let capability = normalize_name(capability);
        if let Some(entry) = self.entries.get_mut(&capability) {
            entry.backends.push(Backend {
                name: name.to_string(),
                capability: capability.clone(),
                priority,
                adapter,
            });
        }
        self
    }

    /// Validate and freeze the registry.
    ///
    /// A declared capability with no backends fails here, at startup.
    pub fn build(mut self) -> Result<CapabilityRegistry, OrchestratorError> {
        for name in &self.order {
            let entry = self.entries.get_mut(name).expect("declared capability");
            if entry.backends.is_empty() {
                return Err(OrchestratorError::NoBackendRegistered {
                    capability: name.clone(),
                });
            }
            // Stable sort keeps registration order for equal priorities
            entry.backends.sort_by_key(|b| b.priority);
        }

        Ok(CapabilityRegistry {
            entries: self.entries,
        })
    }
}
