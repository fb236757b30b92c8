//! Endpoint pricing and cost estimation.

use crate::types::Endpoint;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Character-based approximation (4 chars ≈ 1 token).
#[derive(Debug, Clone)]
pub struct CharacterEstimator {
    chars_per_token: f64,
}
impl CharacterEstimator {
    pub fn new() -> Self {
        Self::with_ratio(4.0)
    }
    pub fn with_ratio(r: f64) -> Self {
        Self { chars_per_token: r }
    }
}
impl Default for CharacterEstimator {
    fn default() -> Self {
        Self::new()
    }
}
impl TokenCounter for CharacterEstimator {
    fn count(&self, text: &str) -> usize {
        (text.len() as f64 / self.chars_per_token).ceil() as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointPricing {
    /// Flat per-call charge (e.g. per image or per audio clip).
    pub base_cost: f64,
    pub input_cost_per_1k: f64,
    pub output_cost_per_1k: f64,
}

impl EndpointPricing {
    pub fn new(base: f64, input: f64, output: f64) -> Self {
        Self {
            base_cost: base,
            input_cost_per_1k: input,
            output_cost_per_1k: output,
        }
    }

    pub fn for_endpoint(endpoint: Endpoint) -> Self {
        match endpoint {
            Endpoint::Chat => Self::new(0.0, 0.00015, 0.0006),
            Endpoint::LessonGeneration => Self::new(0.0, 0.005, 0.015),
            Endpoint::ImageAnalysis => Self::new(0.00765, 0.005, 0.015),
            Endpoint::VoiceAnalysis => Self::new(0.006, 0.00015, 0.0006),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub endpoint: Endpoint,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_cost: f64,
}

impl CostEstimate {
    pub fn format(&self) -> String {
        if self.total_cost < 0.01 {
            format!("{:.4}¢", self.total_cost * 100.0)
        } else {
            format!("${:.4}", self.total_cost)
        }
    }
}

/// Estimates what a call costs (or, on a cache hit, what it would have cost).
///
/// Assumes flat per-call pricing: every cache hit is valued as one avoided
/// identical call. Usage-tiered upstream billing is not modelled.
pub struct CostEstimator {
    counter: Box<dyn TokenCounter>,
    overrides: BTreeMap<Endpoint, EndpointPricing>,
}

impl CostEstimator {
    pub fn new() -> Self {
        Self {
            counter: Box::new(CharacterEstimator::new()),
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_counter(mut self, counter: Box<dyn TokenCounter>) -> Self {
        self.counter = counter;
        self
    }

    pub fn with_pricing(mut self, endpoint: Endpoint, pricing: EndpointPricing) -> Self {
        self.overrides.insert(endpoint, pricing);
        self
    }

    pub fn pricing(&self, endpoint: Endpoint) -> EndpointPricing {
        self.overrides
            .get(&endpoint)
            .cloned()
            .unwrap_or_else(|| EndpointPricing::for_endpoint(endpoint))
    }

    pub fn estimate(&self, endpoint: Endpoint, request: &Value, output: &Value) -> CostEstimate {
        let input_tokens = self.counter.count(&json_text(request));
        let output_tokens = self.counter.count(&json_text(output));
        let p = self.pricing(endpoint);
        let total_cost = p.base_cost
            + (input_tokens as f64 / 1000.0) * p.input_cost_per_1k
            + (output_tokens as f64 / 1000.0) * p.output_cost_per_1k;
        CostEstimate {
            endpoint,
            input_tokens,
            output_tokens,
            total_cost,
        }
    }
}

impl Default for CostEstimator {
    fn default() -> Self {
        Self::new()
    }
}

fn json_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_character_estimator() {
        let c = CharacterEstimator::new();
        assert_eq!(c.count(""), 0);
        assert_eq!(c.count("abcd"), 1);
        assert_eq!(c.count("abcde"), 2);
    }

    #[test]
    fn test_estimate_scales_with_output() {
        let e = CostEstimator::new();
        let req = json!({"topic": "Fractions"});
        let short = e.estimate(Endpoint::LessonGeneration, &req, &json!("x"));
        let long = e.estimate(Endpoint::LessonGeneration, &req, &json!("x".repeat(4000)));
        assert!(long.total_cost > short.total_cost);
        assert_eq!(long.output_tokens, 1000);
        assert!((long.total_cost - short.total_cost - (999.0 / 1000.0) * 0.015).abs() < 1e-9);
    }

    #[test]
    fn test_base_cost_applies_to_media_endpoints() {
        let e = CostEstimator::new();
        let est = e.estimate(Endpoint::ImageAnalysis, &json!({}), &json!({}));
        assert!(est.total_cost >= 0.00765);
    }

    #[test]
    fn test_pricing_override() {
        let e = CostEstimator::new().with_pricing(Endpoint::Chat, EndpointPricing::new(1.0, 0.0, 0.0));
        let est = e.estimate(Endpoint::Chat, &json!({"message": "hi"}), &json!("hello"));
        assert_eq!(est.total_cost, 1.0);
        assert_eq!(est.format(), "$1.0000");
    }
}
