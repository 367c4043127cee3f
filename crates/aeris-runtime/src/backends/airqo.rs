//! AirQo adapter.
//!
//! Measurement lookups against the AirQo public API. The measurement
//! payload is returned opaque.

use super::http::{query_from_arguments, shared_client};
use super::secrets::ApiCredential;
use super::{BackendAdapter, BackendError, BackendFactory};
use aeris_core::{Arguments, BackendConfig};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Environment variable name for the AirQo API token.
pub const AIRQO_TOKEN_ENV: &str = "AIRQO_TOKEN";

const DEFAULT_BASE_URL: &str = "https://api.airqo.net/api/v2";

/// AirQo measurements adapter.
pub struct AirqoAdapter {
    credential: ApiCredential,
    base_url: String,
}

impl std::fmt::Debug for AirqoAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AirqoAdapter")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AirqoAdapter {
    /// Create an adapter with an explicit token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            credential: ApiCredential::new(
                token,
                super::CredentialSource::Programmatic,
                "AirQo token",
            ),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create from backend settings with environment fallback.
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        let credential = ApiCredential::from_settings_or_env(
            &config.settings,
            "token",
            AIRQO_TOKEN_ENV,
            "AirQo token",
        )?;

        let base_url = config.settings["base_url"]
            .as_str()
            .unwrap_or(DEFAULT_BASE_URL)
            .to_string();

        Ok(Self {
            credential,
            base_url,
        })
    }
}

#[async_trait]
impl BackendAdapter for AirqoAdapter {
    async fn invoke(&self, arguments: &Arguments) -> Result<JsonValue, BackendError> {
        let url = format!("{}/devices/measurements", self.base_url);
        let mut query = query_from_arguments(arguments);
        query.push(("token".to_string(), self.credential.expose().to_string()));

        let response = shared_client()
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| BackendError::Http(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(BackendError::Auth);
        }
        if !status.is_success() {
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: status.to_string(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))
    }

    fn name(&self) -> &str {
        "airqo"
    }
}

/// Factory registering the "airqo" kind.
pub struct AirqoBackendFactory;

impl BackendFactory for AirqoBackendFactory {
    fn kind(&self) -> &'static str {
        "airqo"
    }

    fn create(&self, config: &BackendConfig) -> Result<Arc<dyn BackendAdapter>, BackendError> {
        Ok(Arc::new(AirqoAdapter::from_config(config)?))
    }

    fn description(&self) -> &'static str {
        "AirQo device measurements"
    }
}
