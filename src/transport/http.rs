use super::{Upstream, UpstreamReply};
use crate::types::Endpoint;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use keyring::Entry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Reply fields checked, in order, for the generated text.
const TEXT_FIELDS: [&str; 3] = ["text", "content", "response"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    /// Environment variable holding the bearer token.
    pub api_key_env: String,
    /// Look the token up in the OS keyring (service `ai-gateway`) before the environment.
    pub use_keyring: bool,
    /// Transport-level ceiling; per-attempt deadlines are enforced by the gateway.
    pub request_timeout_secs: u64,
    pub pool_max_idle_per_host: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/ai".to_string(),
            api_key_env: "AI_GATEWAY_API_KEY".to_string(),
            use_keyring: true,
            request_timeout_secs: 120,
            pool_max_idle_per_host: 32,
        }
    }
}

/// JSON-over-HTTP backend: `POST <base_url>/<endpoint>` with the request payload.
pub struct HttpUpstream {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpUpstream {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let parsed = url::Url::parse(&config.base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid upstream base url: {}", e),
                ErrorContext::new()
                    .with_field_path("upstream.base_url")
                    .with_source("http_upstream"),
            )
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::configuration_with_context(
                "upstream base url must be http(s)",
                ErrorContext::new()
                    .with_field_path("upstream.base_url")
                    .with_details(parsed.scheme().to_string())
                    .with_source("http_upstream"),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: Self::get_api_key(config),
        })
    }

    fn get_api_key(config: &UpstreamConfig) -> Option<String> {
        // 1. Try Keyring
        if config.use_keyring {
            if let Ok(entry) = Entry::new("ai-gateway", "upstream") {
                if let Ok(key) = entry.get_password() {
                    return Some(key);
                }
            }
        }

        // 2. Try Environment Variable
        env::var(&config.api_key_env).ok().filter(|k| !k.is_empty())
    }

    fn url_for(&self, endpoint: Endpoint) -> String {
        format!("{}/{}", self.base_url, endpoint.as_str())
    }

    fn reply_from_body(raw: String) -> UpstreamReply {
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::String(s)) => UpstreamReply::text(s),
            Ok(json) => {
                let text = TEXT_FIELDS
                    .iter()
                    .find_map(|f| json.get(*f).and_then(|v| v.as_str()))
                    .map(str::to_string)
                    .unwrap_or_else(|| raw.clone());
                UpstreamReply::text(text).with_body(json)
            }
            Err(_) => UpstreamReply::text(raw),
        }
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn call(&self, endpoint: Endpoint, payload: &Value) -> Result<UpstreamReply> {
        let request_id = Uuid::new_v4().to_string();
        let start = std::time::Instant::now();

        let mut req = self
            .client
            .post(self.url_for(endpoint))
            .json(payload)
            .header("x-ai-gateway-request-id", &request_id);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            info!(
                http_status = status.as_u16(),
                endpoint = endpoint.as_str(),
                request_id = request_id.as_str(),
                duration_ms = start.elapsed().as_millis() as u64,
                "upstream request failed"
            );
            return Err(Error::upstream(Some(status.as_u16()), body));
        }

        Ok(Self::reply_from_body(body))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
