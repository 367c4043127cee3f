//! SearXNG adapter.
//!
//! Metasearch queries against a self-hosted SearXNG instance, used for
//! research-tier document lookups. No credential required; the instance
//! URL must be configured.

use super::http::{query_from_arguments, shared_client};
use super::{BackendAdapter, BackendError, BackendFactory};
use aeris_core::{Arguments, BackendConfig};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// SearXNG metasearch adapter.
#[derive(Debug)]
pub struct SearxAdapter {
    base_url: String,
}

impl SearxAdapter {
    /// Create an adapter against the given instance.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Create from backend settings; `base_url` is required.
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        let base_url = config.settings["base_url"].as_str().ok_or_else(|| {
            BackendError::NotConfigured(
                "searx requires 'base_url' in backend settings".to_string(),
            )
        })?;

        Ok(Self::new(base_url))
    }
}

#[async_trait]
impl BackendAdapter for SearxAdapter {
    async fn invoke(&self, arguments: &Arguments) -> Result<JsonValue, BackendError> {
        let query_text = arguments
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| BackendError::MissingArgument("query".to_string()))?;

        let url = format!("{}/search", self.base_url);
        let mut query = query_from_arguments(arguments);
        query.retain(|(k, _)| k != "query");
        query.push(("q".to_string(), query_text.to_string()));
        query.push(("format".to_string(), "json".to_string()));

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
        "searx"
    }
}

/// Factory registering the "searx" kind.
pub struct SearxBackendFactory;

impl BackendFactory for SearxBackendFactory {
    fn kind(&self) -> &'static str {
        "searx"
    }

    fn create(&self, config: &BackendConfig) -> Result<Arc<dyn BackendAdapter>, BackendError> {
        Ok(Arc::new(SearxAdapter::from_config(config)?))
    }

    fn description(&self) -> &'static str {
        "SearXNG metasearch instance"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_base_url_is_not_configured() {
        let config = BackendConfig {
            name: "searx".to_string(),
            kind: "searx".to_string(),
            priority: 1,
            settings: serde_json::json!({}),
        };
        assert!(matches!(
            SearxAdapter::from_config(&config),
            Err(BackendError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_query_argument() {
        let adapter = SearxAdapter::new("http://localhost:8888");
        let err = adapter.invoke(&Arguments::new()).await.unwrap_err();
        assert!(matches!(err, BackendError::MissingArgument(ref a) if a == "query"));
    }
}
