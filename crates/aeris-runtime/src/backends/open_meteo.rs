//! Open-Meteo adapter.
//!
//! Forecast lookups against `api.open-meteo.com`. No credential required.

use super::http::{query_from_arguments, shared_client};
use super::{BackendAdapter, BackendError, BackendFactory};
use aeris_core::{Arguments, BackendConfig};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;

const DEFAULT_BASE_URL: &str = "https://api.open-meteo.com/v1";

/// Open-Meteo forecast adapter.
#[derive(Debug)]
pub struct OpenMeteoAdapter {
    base_url: String,
    endpoint: String,
}

impl OpenMeteoAdapter {
    /// Create an adapter against the default endpoint.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            endpoint: "forecast".to_string(),
        }
    }

    /// Create from backend settings.
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        let base_url = config.settings["base_url"]
            .as_str()
            .unwrap_or(DEFAULT_BASE_URL)
            .to_string();
        let endpoint = config.settings["endpoint"]
            .as_str()
            .unwrap_or("forecast")
            .to_string();

        Ok(Self { base_url, endpoint })
    }
}

impl Default for OpenMeteoAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackendAdapter for OpenMeteoAdapter {
    async fn invoke(&self, arguments: &Arguments) -> Result<JsonValue, BackendError> {
        let url = format!("{}/{}", self.base_url, self.endpoint);
        let query = query_from_arguments(arguments);

        let response = shared_client()
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| BackendError::Http(e.to_string()))?;

        let status = response.status();
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
        "open-meteo"
    }
}

/// Factory registering the "open-meteo" kind.
pub struct OpenMeteoBackendFactory;

impl BackendFactory for OpenMeteoBackendFactory {
    fn kind(&self) -> &'static str {
        "open-meteo"
    }

    fn create(&self, config: &BackendConfig) -> Result<Arc<dyn BackendAdapter>, BackendError> {
        Ok(Arc::new(OpenMeteoAdapter::from_config(config)?))
    }

    fn description(&self) -> &'static str {
        "Open-Meteo forecast API"
    }
}
