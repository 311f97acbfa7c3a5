//! Backend-neutral filter and update specifications (spec.md §4.7
//! "Storage Abstraction"), built the way `r2e_data::query::QueryBuilder`
//! builds SQL: chained `where`-style calls accumulating into an AST that
//! each backend renders in its own dialect.

use deployd_core::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    pub fn from_operator(op: &str) -> Option<CompareOp> {
        match op {
            "=" => Some(CompareOp::Eq),
            "!=" => Some(CompareOp::Ne),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Lte),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Gte),
            _ => None,
        }
    }
}

/// One condition in a [`Filter`] — spec.md §4.7's operator set.
#[derive(Debug, Clone)]
pub enum Condition {
    Compare(CompareOp, Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Regex(String),
    Exists(bool),
}

/// A conjunction of per-field conditions. Deployd collections never need
/// disjunction at the filter level, matching the original's query shape.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    conditions: Vec<(String, Condition)>,
}

impl Filter {
    pub fn new() -> Self {
        Filter::default()
    }

    pub fn where_cond(mut self, field: impl Into<String>, condition: Condition) -> Self {
        self.conditions.push((field.into(), condition));
        self
    }

    pub fn eq(self, field: impl Into<String>, value: Value) -> Self {
        self.where_cond(field, Condition::Compare(CompareOp::Eq, value))
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Condition)> {
        self.conditions.iter()
    }
}

/// A `$sort`/`$limit`/`$skip`/`$fields` bundle — the reserved options split
/// out of the query map before the remainder becomes a [`Filter`] (spec.md
/// §4.3 "GET (list)").
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub sort: Vec<(String, bool)>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
    pub fields: Option<Vec<String>>,
}

/// One mutation in an [`UpdateSpec`] — the atomic operators of spec.md §4.7.
#[derive(Debug, Clone)]
pub enum UpdateOp {
    Set(Value),
    Inc(f64),
    Unset,
    Push(Value),
    Pull(Value),
    AddToSet(Value),
}

#[derive(Debug, Clone, Default)]
pub struct UpdateSpec {
    ops: Vec<(String, UpdateOp)>,
}

impl UpdateSpec {
    pub fn new() -> Self {
        UpdateSpec::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: Value) -> Self {
        self.ops.push((field.into(), UpdateOp::Set(value)));
        self
    }

    pub fn inc(mut self, field: impl Into<String>, amount: f64) -> Self {
        self.ops.push((field.into(), UpdateOp::Inc(amount)));
        self
    }

    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.ops.push((field.into(), UpdateOp::Unset));
        self
    }

    pub fn push(mut self, field: impl Into<String>, value: Value) -> Self {
        self.ops.push((field.into(), UpdateOp::Push(value)));
        self
    }

    pub fn pull(mut self, field: impl Into<String>, value: Value) -> Self {
        self.ops.push((field.into(), UpdateOp::Pull(value)));
        self
    }

    pub fn add_to_set(mut self, field: impl Into<String>, value: Value) -> Self {
        self.ops.push((field.into(), UpdateOp::AddToSet(value)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, UpdateOp)> {
        self.ops.iter()
    }

    /// Whether this spec is a plain `$set` of every field — an update
    /// without any `$`-operator is equivalent to this (spec.md §4.7
    /// cross-backend invariant).
    pub fn from_full_document(document: &deployd_core::Document) -> Self {
        let mut spec = UpdateSpec::new();
        for (field, value) in document.iter() {
            spec = spec.set(field.clone(), value.clone());
        }
        spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_op_parses_every_declared_operator() {
        for op in ["=", "!=", "<", "<=", ">", ">="] {
            assert!(CompareOp::from_operator(op).is_some());
        }
        assert!(CompareOp::from_operator("$nonsense").is_none());
    }

    #[test]
    fn full_document_update_is_a_flat_set() {
        let mut doc = deployd_core::Document::new();
        doc.insert("title", Value::from("milk"));
        let spec = UpdateSpec::from_full_document(&doc);
        assert_eq!(spec.iter().count(), 1);
        assert!(matches!(spec.iter().next().unwrap().1, UpdateOp::Set(_)));
    }
}
