//! Shared HTTP plumbing for provider adapters.

use aeris_core::Arguments;
use serde_json::Value as JsonValue;
use std::sync::OnceLock;
use std::time::Duration;

/// Process-wide HTTP client shared by all adapters.
pub(crate) fn shared_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client")
    })
}

/// Render normalized arguments as query pairs.
///
/// Arguments are scalar-valued; strings pass through unquoted, other
/// scalars use their JSON rendering.
pub(crate) fn query_from_arguments(arguments: &Arguments) -> Vec<(String, String)> {
    arguments
        .iter()
        .map(|(k, v)| {
            let rendered = match v {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), rendered)
        })
        .collect()
}
