//! Cache key derivation.

use crate::types::Endpoint;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Default namespace token marking a key as an AI-gateway cache entry.
pub const DEFAULT_NAMESPACE: &str = "ai_cache";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Full store key, `<namespace>:<endpoint>:<sha256-hex>`.
    pub key: String,
    pub endpoint: Option<Endpoint>,
}

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            endpoint: None,
        }
    }
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }
    pub fn as_str(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Deterministic key derivation from (endpoint, request payload, user).
///
/// The triple is serialized with object keys in sorted order at every depth,
/// so logically identical payloads hash identically regardless of field order.
#[derive(Debug, Clone)]
pub struct KeyDeriver {
    namespace: String,
}

impl KeyDeriver {
    pub fn new() -> Self {
        Self::with_namespace(DEFAULT_NAMESPACE)
    }

    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn derive(&self, endpoint: Endpoint, request: &Value, user_id: &str) -> CacheKey {
        let mut canonical = String::with_capacity(128);
        canonical.push('{');
        push_json_str(&mut canonical, "endpoint");
        canonical.push(':');
        push_json_str(&mut canonical, endpoint.as_str());
        canonical.push(',');
        push_json_str(&mut canonical, "request");
        canonical.push(':');
        write_canonical(request, &mut canonical);
        canonical.push(',');
        push_json_str(&mut canonical, "userId");
        canonical.push(':');
        push_json_str(&mut canonical, user_id);
        canonical.push('}');

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let hash: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();

        CacheKey::new(format!("{}:{}:{}", self.namespace, endpoint.as_str(), hash))
            .with_endpoint(endpoint)
    }

    /// Glob pattern covering every key of one endpoint.
    pub fn endpoint_pattern(&self, endpoint: Endpoint) -> String {
        format!("{}:{}:*", self.namespace, endpoint.as_str())
    }
}

impl Default for KeyDeriver {
    fn default() -> Self {
        Self::new()
    }
}

fn push_json_str(out: &mut String, s: &str) {
    // Serializing a &str cannot fail.
    out.push_str(&serde_json::to_string(s).unwrap_or_default());
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (k, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                push_json_str(out, k);
                out.push(':');
                write_canonical(v, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, v) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(v, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_derive_is_deterministic() {
        let d = KeyDeriver::new();
        let req = json!({"topic": "Fractions", "difficulty": "beginner"});
        let a = d.derive(Endpoint::LessonGeneration, &req, "u1");
        let b = d.derive(Endpoint::LessonGeneration, &req, "u1");
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("ai_cache:lesson-generation:"));
        assert_eq!(a.as_str().len(), "ai_cache:lesson-generation:".len() + 64);
    }

    #[test]
    fn test_derive_ignores_field_order() {
        let d = KeyDeriver::new();
        let a: Value = serde_json::from_str(r#"{"a":1,"b":{"x":[1,2],"y":"z"}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"b":{"y":"z","x":[1,2]},"a":1}"#).unwrap();
        assert_eq!(
            d.derive(Endpoint::Chat, &a, "u"),
            d.derive(Endpoint::Chat, &b, "u")
        );
    }

    #[test]
    fn test_any_single_field_change_changes_key() {
        let d = KeyDeriver::new();
        let base = json!({"message": "hi", "context": {"grade": 3}});
        let k = d.derive(Endpoint::Chat, &base, "u1");

        assert_ne!(k, d.derive(Endpoint::Chat, &base, "u2"));
        assert_ne!(k, d.derive(Endpoint::LessonGeneration, &base, "u1"));
        assert_ne!(
            k,
            d.derive(Endpoint::Chat, &json!({"message": "hi", "context": {"grade": 4}}), "u1")
        );
        assert_ne!(
            k,
            d.derive(
                Endpoint::Chat,
                &json!({"message": "hi", "context": {"grade": 3}, "image": "AAAA"}),
                "u1"
            )
        );
        // Arrays are order sensitive.
        assert_ne!(
            d.derive(Endpoint::Chat, &json!({"m": [1, 2]}), "u"),
            d.derive(Endpoint::Chat, &json!({"m": [2, 1]}), "u")
        );
    }

    #[test]
    fn test_namespace_and_pattern() {
        let d = KeyDeriver::with_namespace("tenant_a");
        let k = d.derive(Endpoint::Chat, &json!({}), "u");
        assert!(k.as_str().starts_with("tenant_a:chat:"));
        assert_eq!(d.endpoint_pattern(Endpoint::Chat), "tenant_a:chat:*");
        assert!(crate::utils::glob_match(&d.endpoint_pattern(Endpoint::Chat), k.as_str()));
    }
}
