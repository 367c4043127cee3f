//! Orchestrator and capability-registry configuration.
//!
//! Read once at process start, immutable at runtime. Every numeric
//! threshold here is a tunable default, not a guaranteed constant.
//! Durations are written as humantime strings ("30s", "5m", "24h").

use crate::error::OrchestratorError;
use crate::tier::{CacheTier, TierTtls};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

/// Serde adapter for humantime duration strings.
pub mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

/// Circuit breaker tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,

    /// Time the circuit stays open before a half-open trial
    #[serde(with = "duration_str")]
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(300),
        }
    }
}

/// Rolling-window request budget tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Maximum consumed units per window
    pub limit: u32,

    /// Window length
    #[serde(with = "duration_str")]
    pub period: Duration,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            limit: 60,
            period: Duration::from_secs(60),
        }
    }
}

/// Response cache tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Number of independent shards; one lock per shard
    pub shards: usize,

    /// Per-tier TTL overrides
    pub ttls: TierTtls,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            shards: 16,
            ttls: TierTtls::default(),
        }
    }
}

/// Batch executor tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Worker-pool concurrency ceiling per batch
    pub max_concurrency: usize,

    /// Deadline for resolving one unique identity (the whole chain walk)
    #[serde(with = "duration_str")]
    pub call_timeout: Duration,

    /// Deadline for a single backend attempt inside the chain
    #[serde(with = "duration_str")]
    pub attempt_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            call_timeout: Duration::from_secs(30),
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

/// One backend entry in a capability's fallback chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend name, unique within the capability
    pub name: String,

    /// Adapter kind the factory registry resolves (e.g., "waqi")
    pub kind: String,

    /// Fallback priority; lower is tried first, ties keep file order
    #[serde(default)]
    pub priority: i32,

    /// Adapter-specific settings (base URL, credentials, ...)
    #[serde(default)]
    pub settings: JsonValue,
}

/// One capability the system claims to support.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityConfig {
    /// Capability name (e.g., "current_air_quality")
    pub name: String,

    /// Volatility tier for cached responses
    pub tier: CacheTier,

    /// Fallback chain, in file order
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
}

/// Top-level orchestrator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Circuit breaker tuning
    pub circuit_breaker: CircuitBreakerConfig,

    /// Budget tuning
    pub budget: BudgetConfig,

    /// Cache tuning
    pub cache: CacheConfig,

    /// Executor tuning
    pub executor: ExecutorConfig,

    /// Capability registry
    pub capabilities: Vec<CapabilityConfig>,
}

impl OrchestratorConfig {
    /// Parse from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, OrchestratorError> {
        serde_yaml::from_str(yaml)
            .map_err(|e| OrchestratorError::InvalidConfig(e.to_string()))
    }

    /// Parse from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, OrchestratorError> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            OrchestratorError::InvalidConfig(format!(
                "cannot read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_yaml(&raw)
    }

    /// Startup validation.
    ///
    /// A capability with zero backends is fatal here, not per-request.
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.executor.max_concurrency == 0 {
            return Err(OrchestratorError::InvalidConfig(
                "executor.max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.cache.shards == 0 {
            return Err(OrchestratorError::InvalidConfig(
                "cache.shards must be at least 1".to_string(),
            ));
        }

        let mut capability_names = BTreeSet::new();
        for capability in &self.capabilities {
            if !capability_names.insert(capability.name.as_str()) {
                return Err(OrchestratorError::InvalidConfig(format!(
                    "capability '{}' declared twice",
                    capability.name
                )));
            }
            if capability.backends.is_empty() {
                return Err(OrchestratorError::NoBackendRegistered {
                    capability: capability.name.clone(),
                });
            }

            let mut backend_names = BTreeSet::new();
            for backend in &capability.backends {
                if !backend_names.insert(backend.name.as_str()) {
                    return Err(OrchestratorError::InvalidConfig(format!(
                        "backend '{}' declared twice for capability '{}'",
                        backend.name, capability.name
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
circuit_breaker:
  failure_threshold: 3
  cooldown: 2m
budget:
  limit: 100
  period: 1m
executor:
  max_concurrency: 8
  call_timeout: 20s
  attempt_timeout: 5s
capabilities:
  - name: current_air_quality
    tier: live_reading
    backends:
      - name: airqo
        kind: airqo
        priority: 1
      - name: waqi
        kind: waqi
        priority: 2
  - name: weather_forecast
    tier: forecast
    backends:
      - name: open-meteo
        kind: open-meteo
        priority: 1
"#;

    #[test]
    fn test_parse_sample() {
        let config = OrchestratorConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.circuit_breaker.cooldown, Duration::from_secs(120));
        assert_eq!(config.executor.call_timeout, Duration::from_secs(20));
        assert_eq!(config.capabilities.len(), 2);
        assert_eq!(config.capabilities[0].tier, CacheTier::LiveReading);
        config.validate().unwrap();
    }

    #[test]
    fn test_defaults_match_shipped_values() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.cooldown, Duration::from_secs(300));
        assert_eq!(config.executor.max_concurrency, 5);
        assert_eq!(config.executor.call_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_empty_backend_list_is_fatal() {
        let yaml = r#"
capabilities:
  - name: current_air_quality
    tier: live_reading
    backends: []
"#;
        let config = OrchestratorConfig::from_yaml(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::NoBackendRegistered { ref capability }
                if capability == "current_air_quality"
        ));
    }

    #[test]
    fn test_duplicate_backend_rejected() {
        let yaml = r#"
capabilities:
  - name: current_air_quality
    tier: live_reading
    backends:
      - name: airqo
        kind: airqo
      - name: airqo
        kind: airqo
"#;
        let config = OrchestratorConfig::from_yaml(yaml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(OrchestratorError::InvalidConfig(_))
        ));
    }
}
