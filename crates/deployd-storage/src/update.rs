//! Applies an [`UpdateSpec`] to an in-memory [`Document`] — the operator
//! semantics shared by the Collection Handler's pre-store simulation
//! (spec.md §4.3 "Operator simulation") and every SQL backend's
//! read-modify-write commit path.

use deployd_core::{Document, Value};

use crate::filter::{UpdateOp, UpdateSpec};

pub fn apply(document: &mut Document, spec: &UpdateSpec) {
    for (field, op) in spec.iter() {
        match op {
            UpdateOp::Set(value) => {
                document.insert(field.clone(), value.clone());
            }
            UpdateOp::Inc(amount) => {
                let current = document.get(field).and_then(Value::as_f64).unwrap_or(0.0);
                document.insert(field.clone(), Value::Number(current + amount));
            }
            UpdateOp::Unset => {
                document.remove(field);
            }
            UpdateOp::Push(value) => {
                let mut items = array_at(document, field);
                items.push(value.clone());
                document.insert(field.clone(), Value::Array(items));
            }
            UpdateOp::Pull(value) => {
                let items = array_at(document, field);
                let filtered: Vec<Value> = items.into_iter().filter(|item| !item.stringified_eq(value)).collect();
                document.insert(field.clone(), Value::Array(filtered));
            }
            UpdateOp::AddToSet(value) => {
                let mut items = array_at(document, field);
                if !items.iter().any(|item| item.stringified_eq(value)) {
                    items.push(value.clone());
                }
                document.insert(field.clone(), Value::Array(items));
            }
        }
    }
}

fn array_at(document: &Document, field: &str) -> Vec<Value> {
    match document.get(field) {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inc_adds_numerically_defaulting_absent_to_zero() {
        let mut doc = Document::new();
        apply(&mut doc, &UpdateSpec::new().inc("count", 3.0));
        assert_eq!(doc.get("count"), Some(&Value::Number(3.0)));
    }

    #[test]
    fn push_appends() {
        let mut doc = Document::new();
        doc.insert("tags", Value::Array(vec![Value::from("a")]));
        apply(&mut doc, &UpdateSpec::new().push("tags", Value::from("b")));
        assert_eq!(
            doc.get("tags"),
            Some(&Value::Array(vec![Value::from("a"), Value::from("b")]))
        );
    }

    #[test]
    fn pull_removes_by_stringified_equality() {
        let mut doc = Document::new();
        doc.insert("tags", Value::Array(vec![Value::from("a"), Value::from("b")]));
        apply(&mut doc, &UpdateSpec::new().pull("tags", Value::from("a")));
        assert_eq!(doc.get("tags"), Some(&Value::Array(vec![Value::from("b")])));
    }

    #[test]
    fn add_to_set_skips_existing_member() {
        let mut doc = Document::new();
        doc.insert("tags", Value::Array(vec![Value::from("a")]));
        apply(&mut doc, &UpdateSpec::new().add_to_set("tags", Value::from("a")));
        assert_eq!(doc.get("tags"), Some(&Value::Array(vec![Value::from("a")])));
    }

    #[test]
    fn unset_removes_field() {
        let mut doc = Document::new();
        doc.insert("title", Value::from("milk"));
        apply(&mut doc, &UpdateSpec::new().unset("title"));
        assert!(!doc.contains_key("title"));
    }
}
