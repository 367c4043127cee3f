//! WAQI (World Air Quality Index) adapter.
//!
//! City feed lookups against `api.waqi.info`. The response payload is
//! returned opaque; per-station normalization belongs to the consumer.

use super::http::{query_from_arguments, shared_client};
use super::secrets::ApiCredential;
use super::{BackendAdapter, BackendError, BackendFactory};
use aeris_core::{Arguments, BackendConfig};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Environment variable name for the WAQI API token.
pub const WAQI_TOKEN_ENV: &str = "WAQI_TOKEN";

const DEFAULT_BASE_URL: &str = "https://api.waqi.info";

/// WAQI city-feed adapter.
pub struct WaqiAdapter {
    credential: ApiCredential,
    base_url: String,
}

impl std::fmt::Debug for WaqiAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaqiAdapter")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl WaqiAdapter {
    /// Create an adapter with an explicit token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            credential: ApiCredential::new(
                token,
                super::CredentialSource::Programmatic,
                "WAQI token",
            ),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create from backend settings with environment fallback.
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        let credential = ApiCredential::from_settings_or_env(
            &config.settings,
            "token",
            WAQI_TOKEN_ENV,
            "WAQI token",
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
impl BackendAdapter for WaqiAdapter {
    async fn invoke(&self, arguments: &Arguments) -> Result<JsonValue, BackendError> {
        let city = arguments
            .get("city")
            .and_then(|v| v.as_str())
            .ok_or_else(|| BackendError::MissingArgument("city".to_string()))?;

        let url = format!("{}/feed/{}/", self.base_url, city);
        let mut query = query_from_arguments(arguments);
        query.retain(|(k, _)| k != "city");
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

        let body: JsonValue = response
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;

        // WAQI wraps errors in a 200 with status != "ok"
        if body["status"].as_str() != Some("ok") {
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: body["data"]
                    .as_str()
                    .unwrap_or("unknown WAQI error")
                    .to_string(),
            });
        }

        Ok(body["data"].clone())
    }

    fn name(&self) -> &str {
        "waqi"
    }
}

/// Factory registering the "waqi" kind.
pub struct WaqiBackendFactory;

impl BackendFactory for WaqiBackendFactory {
    fn kind(&self) -> &'static str {
        "waqi"
    }

    fn create(&self, config: &BackendConfig) -> Result<Arc<dyn BackendAdapter>, BackendError> {
        Ok(Arc::new(WaqiAdapter::from_config(config)?))
    }

    fn description(&self) -> &'static str {
        "World Air Quality Index city feed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_token_is_not_configured() {
        let config = BackendConfig {
            name: "waqi".to_string(),
            kind: "waqi".to_string(),
            priority: 2,
            settings: serde_json::json!({}),
        };
        // Only meaningful when WAQI_TOKEN is not set in the test environment.
        if std::env::var(WAQI_TOKEN_ENV).is_err() {
            assert!(matches!(
                WaqiAdapter::from_config(&config),
                Err(BackendError::NotConfigured(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_missing_city_argument() {
        let adapter = WaqiAdapter::new("test-token");
        let err = adapter.invoke(&Arguments::new()).await.unwrap_err();
        assert!(matches!(err, BackendError::MissingArgument(ref a) if a == "city"));
    }
}
