//! Query sanitization: turns a raw query [`Document`] into a [`Filter`],
//! dropping anything that isn't a declared property or a recognized
//! operator and coercing scalars to the property's declared type (spec.md
//! §4.7 "Query sanitization").

use deployd_core::{Document, Value};
use deployd_schema::{coerce, CollectionConfig};

use crate::filter::{Condition, Filter};

const RESERVED_OPTION_KEYS: [&str; 4] = ["$sort", "$limit", "$skip", "$fields"];

pub fn is_reserved_option(key: &str) -> bool {
    RESERVED_OPTION_KEYS.contains(&key)
}

/// Builds a [`Filter`] from the non-reserved keys of `raw`. Unknown fields
/// and fields whose value fails coercion are dropped silently, matching the
/// original's permissive list-query behavior; no error is raised because a
/// narrowing filter that matches nothing is preferable to rejecting the
/// whole request over a single bad key.
pub fn sanitize_filter(config: &CollectionConfig, raw: &Document) -> Filter {
    let mut filter = Filter::new();
    for (key, value) in raw.iter() {
        if is_reserved_option(key) {
            continue;
        }
        let Some(property) = config.properties.get(key) else {
            continue;
        };
        match value {
            Value::Object(ops) if has_operator_keys(ops) => {
                for (op_key, op_value) in ops.iter() {
                    if let Some(condition) = operator_condition(property.kind, op_key, op_value) {
                        filter = filter.where_cond(key.clone(), condition);
                    }
                }
            }
            scalar => {
                if let Some(coerced) = coerce(scalar, property.kind) {
                    filter = filter.where_cond(key.clone(), Condition::Compare(crate::filter::CompareOp::Eq, coerced));
                }
            }
        }
    }
    filter
}

fn has_operator_keys(doc: &Document) -> bool {
    doc.keys().all(|k| k.starts_with('$'))
}

fn operator_condition(
    property_type: deployd_schema::PropertyType,
    op_key: &str,
    op_value: &Value,
) -> Option<Condition> {
    match op_key {
        "$in" => Some(Condition::In(coerce_array(property_type, op_value))),
        "$nin" => Some(Condition::NotIn(coerce_array(property_type, op_value))),
        "$regex" => op_value.as_str().map(|s| Condition::Regex(s.to_string())),
        "$exists" => op_value.as_bool().map(Condition::Exists),
        "$ne" => coerce(op_value, property_type).map(|v| Condition::Compare(crate::filter::CompareOp::Ne, v)),
        "$lt" => coerce(op_value, property_type).map(|v| Condition::Compare(crate::filter::CompareOp::Lt, v)),
        "$lte" => coerce(op_value, property_type).map(|v| Condition::Compare(crate::filter::CompareOp::Lte, v)),
        "$gt" => coerce(op_value, property_type).map(|v| Condition::Compare(crate::filter::CompareOp::Gt, v)),
        "$gte" => coerce(op_value, property_type).map(|v| Condition::Compare(crate::filter::CompareOp::Gte, v)),
        _ => None,
    }
}

fn coerce_array(property_type: deployd_schema::PropertyType, value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.iter().filter_map(|v| coerce(v, property_type)).collect(),
        other => coerce(other, property_type).into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deployd_schema::{Property, PropertyType};

    fn todos() -> CollectionConfig {
        CollectionConfig::new("todos")
            .add_property(Property::new("title", PropertyType::String))
            .add_property(Property::new("priority", PropertyType::Number))
    }

    #[test]
    fn undeclared_keys_are_dropped() {
        let mut raw = Document::new();
        raw.insert("bogus", Value::from("x"));
        let filter = sanitize_filter(&todos(), &raw);
        assert!(filter.is_empty());
    }

    #[test]
    fn scalar_becomes_equality_condition() {
        let mut raw = Document::new();
        raw.insert("title", Value::from("milk"));
        let filter = sanitize_filter(&todos(), &raw);
        assert_eq!(filter.iter().count(), 1);
    }

    #[test]
    fn reserved_option_keys_are_excluded_from_the_filter() {
        let mut raw = Document::new();
        raw.insert("$limit", Value::Number(10.0));
        let filter = sanitize_filter(&todos(), &raw);
        assert!(filter.is_empty());
    }

    #[test]
    fn operator_object_builds_a_condition() {
        let mut ops = Document::new();
        ops.insert("$gt", Value::Number(2.0));
        let mut raw = Document::new();
        raw.insert("priority", Value::Object(ops));
        let filter = sanitize_filter(&todos(), &raw);
        assert_eq!(filter.iter().count(), 1);
    }
}
