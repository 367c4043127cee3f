//! Secure credential handling for backend adapters.
//!
//! Provider tokens (WAQI, AirQo) are held behind [`ApiCredential`] so that:
//!
//! - **No accidental logging**: credentials cannot appear in Debug output
//! - **Memory safety**: values are zeroed on drop via `secrecy`
//! - **Explicit exposure**: the raw value is only reachable via `.expose()`
//!   at the point of use (an HTTP header or query parameter)

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::fmt;

use super::BackendError;

/// Where a credential was loaded from.
///
/// Useful for debugging configuration issues without exposing the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Loaded from the backend's `settings` block
    Config,
    /// Loaded from an environment variable
    Environment,
    /// Provided programmatically
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Config => write!(f, "config"),
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A securely-stored API credential.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    /// Wrap a raw credential value.
    ///
    /// The value cannot be accidentally logged after this point.
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Load a credential from an environment variable.
    ///
    /// # Arguments
    /// * `env_var` - Name of the environment variable
    /// * `name` - Human-readable name for error messages (e.g., "WAQI token")
    pub fn from_env(env_var: &str, name: &'static str) -> Result<Self, BackendError> {
        std::env::var(env_var)
            .map(|v| Self::new(v, CredentialSource::Environment, name))
            .map_err(|_| {
                BackendError::NotConfigured(format!(
                    "{} not set: configure '{}' environment variable",
                    name, env_var
                ))
            })
    }

    /// Load from backend settings, falling back to an environment variable.
    ///
    /// The recommended path for backend factories:
    /// 1. Check `settings_key` in the backend's settings JSON
    /// 2. Fall back to `env_var`
    /// 3. Error if neither is set
    pub fn from_settings_or_env(
        settings: &JsonValue,
        settings_key: &str,
        env_var: &str,
        name: &'static str,
    ) -> Result<Self, BackendError> {
        if let Some(value) = settings[settings_key].as_str() {
            return Ok(Self::new(value, CredentialSource::Config, name));
        }

        if let Ok(value) = std::env::var(env_var) {
            return Ok(Self::new(value, CredentialSource::Environment, name));
        }

        Err(BackendError::NotConfigured(format!(
            "{} required: set '{}' in backend settings or {} environment variable",
            name, settings_key, env_var
        )))
    }

    /// Expose the credential value for use in an API call.
    ///
    /// Only call this at the point where the credential is needed; never
    /// store the exposed value.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    /// Whether the stored value is empty.
    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().is_empty()
    }

    /// Where this credential came from.
    pub fn source(&self) -> CredentialSource {
        self.source
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .finish()
    }
}
