//! `validate` and `applyDefaults` (spec.md §4.8 "Schema Engine").

use std::collections::BTreeMap;

use chrono::Utc;

use deployd_core::{Document, Value};

use crate::collection::CollectionConfig;
use crate::property::{Property, PropertyType};

/// Field → message, collected rather than short-circuited so a single
/// request surfaces every problem at once.
pub type FieldErrors = BTreeMap<String, String>;

/// Attempts to coerce `value` to `kind`, following spec.md §4.8's coercion
/// table. Returns the original value unchanged if it already matches, the
/// coerced value on success, or `None` if no coercion applies.
pub fn coerce(value: &Value, kind: PropertyType) -> Option<Value> {
    if kind.matches(value) {
        return Some(value.clone());
    }
    match (kind, value) {
        (PropertyType::Number, Value::String(s)) => s.trim().parse::<f64>().ok().map(Value::Number),
        (PropertyType::Boolean, Value::String(s)) => match s.as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        (PropertyType::Date, Value::String(s)) => chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|d| Value::Date(d.with_timezone(&Utc))),
        _ => None,
    }
}

/// `validate(document, isCreate)` — spec.md §4.8.
pub fn validate(config: &CollectionConfig, document: &Document, is_create: bool) -> FieldErrors {
    let mut errors = FieldErrors::new();
    for property in config.properties.values() {
        match document.get(&property.name) {
            None => {
                if property.required && is_create {
                    errors.insert(property.name.clone(), "is required".to_string());
                }
            }
            Some(value) if !value.is_null() => {
                if coerce(value, property.kind).is_none() {
                    errors.insert(
                        property.name.clone(),
                        format!("must be a {}", property.kind.name()),
                    );
                }
            }
            Some(_) => {
                if property.required && is_create {
                    errors.insert(property.name.clone(), "is required".to_string());
                }
            }
        }
    }
    errors
}

/// Applies `coerce` in place to every declared property present on the
/// document, skipping fields that failed coercion (left for `validate` to
/// report).
pub fn coerce_document(config: &CollectionConfig, document: &mut Document) {
    let coerced: Vec<(String, Value)> = config
        .properties
        .values()
        .filter_map(|property| {
            let value = document.get(&property.name)?;
            coerce(value, property.kind).map(|coerced| (property.name.clone(), coerced))
        })
        .collect();
    for (name, value) in coerced {
        document.insert(name, value);
    }
}

/// `applyDefaults(document)` — spec.md §4.8. Only fills in fields absent
/// from the document; never overwrites an explicit value, including an
/// explicit `null`.
pub fn apply_defaults(config: &CollectionConfig, document: &mut Document) {
    for property in config.properties.values() {
        if document.contains_key(&property.name) {
            continue;
        }
        if let Some(value) = resolve_default(property) {
            document.insert(property.name.clone(), value);
        }
    }
}

fn resolve_default(property: &Property) -> Option<Value> {
    if property.is_now_sentinel() {
        return Some(Value::Date(Utc::now()));
    }
    property.default.clone()
}
