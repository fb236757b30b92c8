//! Required-field schemas for structured endpoint output.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Array,
    Object,
    Number,
    Bool,
}

impl FieldKind {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Array => value.is_array(),
            FieldKind::Object => value.is_object(),
            FieldKind::Number => value.is_number(),
            FieldKind::Bool => value.is_boolean(),
        }
    }

    /// Neutral value used when nothing better is known.
    pub fn empty_value(&self) -> Value {
        match self {
            FieldKind::String => Value::String(String::new()),
            FieldKind::Array => Value::Array(Vec::new()),
            FieldKind::Object => Value::Object(Map::new()),
            FieldKind::Number => json!(0),
            FieldKind::Bool => Value::Bool(false),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Array => "array",
            FieldKind::Object => "object",
            FieldKind::Number => "number",
            FieldKind::Bool => "bool",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A required field and the placeholder substituted when it cannot be recovered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub placeholder: Value,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            placeholder: kind.empty_value(),
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::String)
    }

    pub fn array(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Array)
    }

    /// Override the placeholder. A placeholder of the wrong kind is ignored.
    pub fn with_placeholder(mut self, placeholder: Value) -> Self {
        if self.kind.matches(&placeholder) {
            self.placeholder = placeholder;
        }
        self
    }
}

/// The shape a structured endpoint result must have: an object carrying every
/// listed field with the listed kind. Extra fields are allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedShape {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl ExpectedShape {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.retain(|f| f.name != field.name);
        self.fields.push(field);
        self
    }

    /// Generated lesson: title, description, content, objectives, exercises.
    pub fn lesson() -> Self {
        Self::new("lesson")
            .with_field(FieldSpec::string("title").with_placeholder(json!("Untitled Lesson")))
            .with_field(
                FieldSpec::string("description")
                    .with_placeholder(json!("This lesson could not be fully generated.")),
            )
            .with_field(FieldSpec::string("content").with_placeholder(json!(
                "Lesson content is temporarily unavailable. Please try again later."
            )))
            .with_field(FieldSpec::array("objectives"))
            .with_field(FieldSpec::array("exercises"))
    }

    /// Look up a built-in shape by name.
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "lesson" => Some(Self::lesson()),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Required fields that are absent or of the wrong kind. Everything when
    /// `value` is not an object.
    pub fn missing_fields<'a>(&'a self, value: &Value) -> Vec<&'a FieldSpec> {
        match value.as_object() {
            Some(obj) => self
                .fields
                .iter()
                .filter(|f| !obj.get(&f.name).is_some_and(|v| f.kind.matches(v)))
                .collect(),
            None => self.fields.iter().collect(),
        }
    }

    pub fn conforms(&self, value: &Value) -> bool {
        value.is_object() && self.missing_fields(value).is_empty()
    }

    pub fn placeholder_object(&self) -> Value {
        let obj: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.placeholder.clone()))
            .collect();
        Value::Object(obj)
    }
}
