//! Declared fields on a collection (spec.md §3 "Property").

use serde::{Deserialize, Serialize};

use deployd_core::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Number,
    Boolean,
    Date,
    Array,
    Object,
}

impl PropertyType {
    pub fn name(self) -> &'static str {
        match self {
            PropertyType::String => "string",
            PropertyType::Number => "number",
            PropertyType::Boolean => "boolean",
            PropertyType::Date => "date",
            PropertyType::Array => "array",
            PropertyType::Object => "object",
        }
    }

    /// Structural match, per spec.md §4.8: arrays/objects are recognized by
    /// shape, not by a concrete type name.
    pub fn matches(self, value: &Value) -> bool {
        match self {
            PropertyType::String => matches!(value, Value::String(_)),
            PropertyType::Number => matches!(value, Value::Number(_)),
            PropertyType::Boolean => matches!(value, Value::Bool(_)),
            PropertyType::Date => matches!(value, Value::Date(_)),
            PropertyType::Array => value.is_array_like(),
            PropertyType::Object => value.is_object_like(),
        }
    }
}

/// The sentinel default value resolved to "now" at insert time (spec.md §3).
pub const NOW_SENTINEL: &str = "now";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PropertyType,
    #[serde(default)]
    pub required: bool,
    /// A literal default, or `Value::String("now")` for the current-instant
    /// sentinel. `None` means no default.
    #[serde(default)]
    pub default: Option<Value>,
}

impl Property {
    pub fn new(name: impl Into<String>, kind: PropertyType) -> Self {
        Property {
            name: name.into(),
            kind,
            required: false,
            default: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn is_now_sentinel(&self) -> bool {
        self.kind == PropertyType::Date
            && matches!(&self.default, Some(Value::String(s)) if s == NOW_SENTINEL)
    }
}
