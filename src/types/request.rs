//! Gateway call request.

use crate::types::endpoint::Endpoint;
use crate::{Error, ErrorContext, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Strings at least this long made only of base64 characters count as inline media.
const INLINE_BASE64_MIN_LEN: usize = 256;

static BASE64_BLOB: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9+/\r\n]+={0,2}$").expect("static regex"));

/// One logical call through the gateway. Transient: built per invocation, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRequest {
    pub endpoint: Endpoint,
    pub payload: Value,
    pub user_id: String,
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub contains_binary: bool,
    /// The media is addressed by a network-resolvable pointer rather than inlined.
    #[serde(default)]
    pub stable_reference: bool,
}

impl CallRequest {
    pub fn new(endpoint: Endpoint, payload: Value, user_id: impl Into<String>) -> Self {
        Self {
            endpoint,
            payload,
            user_id: user_id.into(),
            streaming: false,
            contains_binary: false,
            stable_reference: false,
        }
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn contains_binary(mut self, contains_binary: bool) -> Self {
        self.contains_binary = contains_binary;
        self
    }

    pub fn stable_reference(mut self, stable: bool) -> Self {
        self.stable_reference = stable;
        self
    }

    /// Derive `contains_binary` / `stable_reference` from the payload itself.
    ///
    /// Any string holding a `data:` URI or a long base64 blob marks the request as
    /// carrying inline binary. For analysis endpoints, an `http(s)` URL in the
    /// reference field marks it as a stable reference.
    pub fn detect_media(mut self) -> Self {
        if payload_has_inline_binary(&self.payload) {
            self.contains_binary = true;
        }
        if let Some((_, reference_field)) = self.endpoint.media_fields() {
            let is_url = self
                .payload
                .get(reference_field)
                .and_then(|v| v.as_str())
                .and_then(|s| url::Url::parse(s).ok())
                .map(|u| matches!(u.scheme(), "http" | "https"))
                .unwrap_or(false);
            if is_url {
                self.stable_reference = true;
            }
        }
        self
    }

    /// Reject malformed caller input before it reaches the gateway.
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(Error::validation_with_context(
                "user id must not be empty",
                ErrorContext::new()
                    .with_field_path("user_id")
                    .with_source("request_validator"),
            ));
        }

        let obj = self.payload.as_object().ok_or_else(|| {
            Error::validation_with_context(
                "payload must be a JSON object",
                ErrorContext::new()
                    .with_field_path("payload")
                    .with_source("request_validator"),
            )
        })?;

        let present = |field: &str| {
            obj.get(field)
                .map(|v| match v {
                    Value::Null => false,
                    Value::String(s) => !s.trim().is_empty(),
                    _ => true,
                })
                .unwrap_or(false)
        };

        let missing = match self.endpoint {
            Endpoint::Chat => (!present("message")).then_some("message"),
            Endpoint::LessonGeneration => (!present("topic")).then_some("topic"),
            Endpoint::ImageAnalysis | Endpoint::VoiceAnalysis => {
                let (inline, reference) = self.endpoint.media_fields().unwrap_or(("", ""));
                (!present(inline) && !present(reference)).then_some(inline)
            }
        };

        if let Some(field) = missing {
            return Err(Error::validation_with_context(
                format!("{} request requires '{}'", self.endpoint, field),
                ErrorContext::new()
                    .with_field_path(format!("payload.{}", field))
                    .with_source("request_validator"),
            ));
        }
        Ok(())
    }
}

fn payload_has_inline_binary(value: &Value) -> bool {
    match value {
        Value::String(s) => {
            s.starts_with("data:")
                || (s.len() >= INLINE_BASE64_MIN_LEN && BASE64_BLOB.is_match(s))
        }
        Value::Array(items) => items.iter().any(payload_has_inline_binary),
        Value::Object(map) => map.values().any(payload_has_inline_binary),
        _ => false,
    }
}
