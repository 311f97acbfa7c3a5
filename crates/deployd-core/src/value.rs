//! The dynamic value and document types every hook, store, and schema rule
//! operates on.
//!
//! A `Document` is a mapping from string keys to a tagged variant. Stored
//! documents may carry keys the current schema no longer declares; readers
//! must tolerate them and writers must filter them through the schema engine
//! before they reach a store.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Number;

/// A single dynamically typed value held in a [`Document`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
    Array(Vec<Value>),
    Object(Document),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Structural sequence-ness, not a concrete type name — spec.md §4.8.
    pub fn is_array_like(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// Structural mapping-ness, not a concrete type name — spec.md §4.8.
    pub fn is_object_like(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Stringified comparison used by `$pull`/`$addToSet` equality — spec.md §4.3.
    pub fn stringified_eq(&self, other: &Value) -> bool {
        self.to_comparison_string() == other.to_comparison_string()
    }

    fn to_comparison_string(&self) -> String {
        serde_json::to_string(&self.to_json()).unwrap_or_default()
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Date(d) => serde_json::Value::String(d.to_rfc3339()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(doc) => serde_json::Value::Object(
                doc.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    pub fn from_json(value: serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => {
                let mut doc = Document::new();
                for (k, v) in map {
                    doc.insert(k, Value::from_json(v));
                }
                Value::Object(doc)
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Date(d) => write!(f, "{}", d.to_rfc3339()),
            Value::Array(_) | Value::Object(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// A document: a mapping from string keys to [`Value`]s, with no fixed schema
/// at rest. Implemented as a `BTreeMap` so iteration order (and therefore
/// serialized field order) is deterministic — useful for fingerprinting and
/// for stable test assertions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document(BTreeMap<String, Value>);

impl Document {
    pub fn new() -> Self {
        Document(BTreeMap::new())
    }

    pub fn from_json_object(value: serde_json::Value) -> Option<Document> {
        match Value::from_json(value) {
            Value::Object(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        Value::Object(self.clone()).to_json()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn id(&self) -> Option<&str> {
        self.get("id").and_then(Value::as_str)
    }

    /// Merges `other` over `self`, `other`'s values winning — used by PUT's
    /// non-operator path (spec.md §4.3, §4.7 cross-backend invariants).
    pub fn merge_over(&self, other: &Document) -> Document {
        let mut merged = self.clone();
        for (k, v) in other.iter() {
            merged.insert(k.clone(), v.clone());
        }
        merged
    }

    /// Removes every key in `hidden` — the outgoing-document half of `hide()`,
    /// spec.md §9 "Hidden fields".
    pub fn without_hidden(&self, hidden: &std::collections::HashSet<String>) -> Document {
        let mut out = self.clone();
        for field in hidden {
            out.remove(field);
        }
        out
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Document(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_over_prefers_incoming() {
        let mut base = Document::new();
        base.insert("title", Value::from("old"));
        base.insert("completed", Value::Bool(false));
        let mut patch = Document::new();
        patch.insert("title", Value::from("new"));
        let merged = base.merge_over(&patch);
        assert_eq!(merged.get("title"), Some(&Value::from("new")));
        assert_eq!(merged.get("completed"), Some(&Value::Bool(false)));
    }

    #[test]
    fn without_hidden_removes_named_fields() {
        let mut doc = Document::new();
        doc.insert("password", Value::from("secret"));
        doc.insert("username", Value::from("alice"));
        let mut hidden = std::collections::HashSet::new();
        hidden.insert("password".to_string());
        let visible = doc.without_hidden(&hidden);
        assert!(!visible.contains_key("password"));
        assert!(visible.contains_key("username"));
    }

    #[test]
    fn stringified_eq_compares_by_serialized_form() {
        let a = Value::Number(1.0);
        let b = Value::Number(1.0);
        assert!(a.stringified_eq(&b));
        assert!(!a.stringified_eq(&Value::String("1".into())));
    }

    #[test]
    fn json_roundtrip_preserves_shape() {
        let mut doc = Document::new();
        doc.insert("a", Value::Number(1.0));
        doc.insert("b", Value::Array(vec![Value::Bool(true), Value::Null]));
        let json = doc.to_json();
        let back = Document::from_json_object(json).unwrap();
        assert_eq!(doc, back);
    }
}
