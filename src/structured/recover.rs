//! Defensive recovery of structured content from free-text replies.

use super::repair::{extract_json_object, repair_json, strip_code_fences};
use super::shape::{ExpectedShape, FieldKind, FieldSpec};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, warn};

/// How the returned content was obtained. Ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryQuality {
    /// Parsed as-is and already conforming.
    Clean,
    /// Parsed after textual repair, or required fields had to be filled in.
    Repaired,
    /// Nothing parseable; built from extracted fragments and placeholders.
    Synthesized,
}

impl RecoveryQuality {
    pub fn is_degraded(&self) -> bool {
        !matches!(self, RecoveryQuality::Clean)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryQuality::Clean => "clean",
            RecoveryQuality::Repaired => "repaired",
            RecoveryQuality::Synthesized => "synthesized",
        }
    }
}

impl fmt::Display for RecoveryQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured result that always satisfies the shape it was recovered against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveredContent {
    pub value: Value,
    pub quality: RecoveryQuality,
    /// Required fields that were not present in the reply and had to be supplied.
    pub filled_fields: Vec<String>,
}

impl RecoveredContent {
    pub fn is_degraded(&self) -> bool {
        self.quality.is_degraded()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseRecoverer;

impl ResponseRecoverer {
    pub fn new() -> Self {
        Self
    }

    /// Recover an object conforming to `shape` from `raw`. Never fails.
    ///
    /// Tries, in order: a plain parse of the first JSON object in the text
    /// (after stripping code fences), a parse of the repaired text, and finally
    /// a synthesized object built from quoted fragments and placeholders.
    pub fn recover(&self, raw: &str, shape: &ExpectedShape) -> RecoveredContent {
        let body = strip_code_fences(raw);
        let candidate = extract_json_object(body).or_else(|| extract_json_object(raw));

        let parsed = candidate.and_then(|text| {
            parse_object(text)
                .map(|v| (v, RecoveryQuality::Clean))
                .or_else(|| parse_object(&repair_json(text)).map(|v| (v, RecoveryQuality::Repaired)))
        });

        let content = match parsed {
            Some((value, quality)) => fill_missing(value, quality, shape, body),
            None => synthesize(body, shape),
        };

        if content.is_degraded() {
            warn!(
                shape = %shape.name,
                quality = %content.quality,
                filled = content.filled_fields.len(),
                raw_len = raw.len(),
                "degraded response recovery"
            );
        } else {
            debug!(shape = %shape.name, "response parsed cleanly");
        }
        content
    }
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(obj)) => Some(obj),
        _ => None,
    }
}

fn fill_missing(
    mut obj: Map<String, Value>,
    mut quality: RecoveryQuality,
    shape: &ExpectedShape,
    text: &str,
) -> RecoveredContent {
    let mut filled_fields = Vec::new();
    for field in &shape.fields {
        if obj.get(&field.name).is_some_and(|v| field.kind.matches(v)) {
            continue;
        }
        let value = extract_fragment(text, field).unwrap_or_else(|| field.placeholder.clone());
        obj.insert(field.name.clone(), value);
        filled_fields.push(field.name.clone());
    }
    if !filled_fields.is_empty() {
        quality = quality.max(RecoveryQuality::Repaired);
    }
    RecoveredContent {
        value: Value::Object(obj),
        quality,
        filled_fields,
    }
}

fn synthesize(text: &str, shape: &ExpectedShape) -> RecoveredContent {
    let mut obj = Map::new();
    let mut filled_fields = Vec::new();
    for field in &shape.fields {
        match extract_fragment(text, field) {
            Some(value) => {
                obj.insert(field.name.clone(), value);
            }
            None => {
                obj.insert(field.name.clone(), field.placeholder.clone());
                filled_fields.push(field.name.clone());
            }
        }
    }
    RecoveredContent {
        value: Value::Object(obj),
        quality: RecoveryQuality::Synthesized,
        filled_fields,
    }
}

static FIELD_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"["']?([A-Za-z_$][A-Za-z0-9_$-]*)["']?\s*:\s*"#).expect("static regex")
});
static STRING_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^"((?:[^"\\]|\\.)*)""#).expect("static regex"));
static ARRAY_VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\[[^\[\]]*\])").expect("static regex"));
static NUMBER_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(-?\d+(?:\.\d+)?(?:[eE][+-]?\d+)?)").expect("static regex"));
static BOOL_VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(true|false)").expect("static regex"));
static OBJECT_VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\{[^{}]*\})").expect("static regex"));

fn value_pattern(kind: FieldKind) -> &'static Regex {
    match kind {
        FieldKind::String => &*STRING_VALUE,
        FieldKind::Array => &*ARRAY_VALUE,
        FieldKind::Number => &*NUMBER_VALUE,
        FieldKind::Bool => &*BOOL_VALUE,
        FieldKind::Object => &*OBJECT_VALUE,
    }
}

/// Look for a literal `"name": <value>` fragment of the field's kind.
/// The first occurrence whose value has the right kind wins.
fn extract_fragment(text: &str, field: &FieldSpec) -> Option<Value> {
    let value_re = value_pattern(field.kind);
    FIELD_KEY
        .captures_iter(text)
        .filter(|caps| caps.get(1).is_some_and(|name| name.as_str() == field.name))
        .find_map(|caps| {
            let rest = &text[caps.get(0)?.end()..];
            let captured = value_re.captures(rest)?.get(1)?.as_str();
            decode_fragment(captured, field.kind)
        })
}

fn decode_fragment(captured: &str, kind: FieldKind) -> Option<Value> {
    let value = match kind {
        FieldKind::String => serde_json::from_str::<Value>(&format!("\"{captured}\""))
            .unwrap_or_else(|_| Value::String(captured.to_string())),
        _ => serde_json::from_str::<Value>(captured)
            .or_else(|_| serde_json::from_str::<Value>(&repair_json(captured)))
            .ok()?,
    };
    kind.matches(&value).then_some(value)
}
