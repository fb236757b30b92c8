//! Gateway configuration: YAML file, `AI_GATEWAY_*` environment overrides, validation.

use crate::cache::{CachePolicy, DEFAULT_NAMESPACE};
use crate::resilience::RetryConfig;
use crate::transport::UpstreamConfig;
use crate::types::Endpoint;
use crate::usage::DEFAULT_RETENTION_DAYS;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub key_namespace: String,
    /// Endpoint → TTL seconds, overriding the built-in table.
    pub ttl_overrides: BTreeMap<Endpoint, u64>,
    pub retry: RetryConfig,
    /// Deadline for endpoints that are not retried.
    pub direct_timeout_ms: u64,
    pub usage_retention_days: u32,
    pub cache_max_entries: usize,
    pub max_entry_size: usize,
    /// Coalesce concurrent identical cacheable requests into one upstream call.
    pub single_flight: bool,
    pub upstream: UpstreamConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            key_namespace: DEFAULT_NAMESPACE.to_string(),
            ttl_overrides: BTreeMap::new(),
            retry: RetryConfig::default(),
            direct_timeout_ms: 30_000,
            usage_retention_days: DEFAULT_RETENTION_DAYS,
            cache_max_entries: 10_000,
            max_entry_size: 10 * 1024 * 1024,
            single_flight: true,
            upstream: UpstreamConfig::default(),
        }
    }
}

impl GatewayConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Apply `AI_GATEWAY_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.apply_env(|name| std::env::var(name).ok())
    }

    /// Apply overrides read through `lookup`; unset variables leave the value unchanged.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("AI_GATEWAY_NAMESPACE") {
            self.key_namespace = v.trim().to_string();
        }
        if let Some(v) = lookup("AI_GATEWAY_UPSTREAM_URL") {
            self.upstream.base_url = v.trim().to_string();
        }
        if let Some(v) = lookup("AI_GATEWAY_DIRECT_TIMEOUT_SECS") {
            let secs: u64 = parse_env("AI_GATEWAY_DIRECT_TIMEOUT_SECS", &v)?;
            self.direct_timeout_ms = secs.saturating_mul(1000);
        }
        if let Some(v) = lookup("AI_GATEWAY_RETRY_DEADLINES_SECS") {
            self.retry.deadlines_ms = v
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| parse_env::<u64>("AI_GATEWAY_RETRY_DEADLINES_SECS", s))
                .map(|r| r.map(|secs| secs.saturating_mul(1000)))
                .collect::<Result<Vec<_>>>()?;
        }
        if let Some(v) = lookup("AI_GATEWAY_RETRY_PAUSE_MS") {
            self.retry.pause_ms = parse_env("AI_GATEWAY_RETRY_PAUSE_MS", &v)?;
        }
        if let Some(v) = lookup("AI_GATEWAY_MIN_VIABLE_LEN") {
            self.retry.min_viable_len = parse_env("AI_GATEWAY_MIN_VIABLE_LEN", &v)?;
        }
        if let Some(v) = lookup("AI_GATEWAY_SINGLE_FLIGHT") {
            self.single_flight = match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(Error::configuration_with_context(
                        "expected a boolean",
                        ErrorContext::new()
                            .with_field_path("AI_GATEWAY_SINGLE_FLIGHT")
                            .with_details(other.to_string())
                            .with_source("env"),
                    ))
                }
            };
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        self.retry.validate()?;
        let invalid = |field: &str, msg: &str| {
            Err(Error::configuration_with_context(
                msg.to_string(),
                ErrorContext::new()
                    .with_field_path(field)
                    .with_source("gateway_config"),
            ))
        };
        if self.key_namespace.is_empty()
            || self
                .key_namespace
                .contains(|c: char| matches!(c, ':' | '*' | '?' | '[' | ']' | '\\'))
        {
            return invalid(
                "key_namespace",
                "namespace must be non-empty and free of ':' and glob characters",
            );
        }
        if self.direct_timeout_ms == 0 {
            return invalid("direct_timeout_ms", "direct timeout must be positive");
        }
        if self.usage_retention_days == 0 {
            return invalid("usage_retention_days", "usage retention must be at least one day");
        }
        if self.cache_max_entries == 0 {
            return invalid("cache_max_entries", "cache capacity must be positive");
        }
        Ok(())
    }

    pub fn policy(&self) -> CachePolicy {
        CachePolicy {
            ttl_overrides: self.ttl_overrides.clone(),
        }
    }

    pub fn direct_timeout(&self) -> Duration {
        Duration::from_millis(self.direct_timeout_ms)
    }
}

fn parse_env<T: FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| {
        Error::configuration_with_context(
            format!("invalid value: {}", e),
            ErrorContext::new()
                .with_field_path(name)
                .with_details(raw.to_string())
                .with_source("env"),
        )
    })
}
