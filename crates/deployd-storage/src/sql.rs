//! Translates a [`Filter`] into a SQL `WHERE` fragment over a JSON document
//! column, in the dialect-aware style of `r2e_data::query::QueryBuilder`:
//! the builder accumulates conditions, a `Dialect` decides placeholder
//! syntax and the JSON-path accessor.

use deployd_core::Value;

use crate::filter::{CompareOp, Condition, Filter, FindOptions};

#[derive(Debug, Clone, Copy)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Sqlite => "?".to_string(),
        }
    }

    /// JSON-path accessor for `field` on the `data` column — spec.md §4.7
    /// "JSON fields storing nested document values are addressed via
    /// JSON-path accessors."
    fn json_extract(self, field: &str) -> String {
        match self {
            Dialect::Sqlite => format!("json_extract(data, '$.{field}')"),
            Dialect::Postgres => format!("data ->> '{field}'"),
        }
    }
}

/// Renders `value` as the text representation stored by `json_extract`
/// (sqlite) / `->>'` (postgres) accessors — both return text, so every bind
/// value is rendered as a string for comparison.
fn bind_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn render_where(dialect: Dialect, filter: &Filter) -> (String, Vec<String>) {
    if filter.is_empty() {
        return (String::new(), Vec::new());
    }
    let mut clauses = Vec::new();
    let mut params = Vec::new();
    let mut next_index = 1usize;
    let mut bind = |value: String, params: &mut Vec<String>, next_index: &mut usize| -> String {
        let placeholder = dialect.placeholder(*next_index);
        *next_index += 1;
        params.push(value);
        placeholder
    };

    for (field, condition) in filter.iter() {
        let accessor = dialect.json_extract(field);
        let clause = match condition {
            Condition::Compare(op, value) => {
                let placeholder = bind(bind_text(value), &mut params, &mut next_index);
                let operator = match op {
                    CompareOp::Eq => "=",
                    CompareOp::Ne => "!=",
                    CompareOp::Lt => "<",
                    CompareOp::Lte => "<=",
                    CompareOp::Gt => ">",
                    CompareOp::Gte => ">=",
                };
                format!("{accessor} {operator} {placeholder}")
            }
            Condition::In(values) | Condition::NotIn(values) => {
                let placeholders: Vec<String> = values
                    .iter()
                    .map(|v| bind(bind_text(v), &mut params, &mut next_index))
                    .collect();
                let keyword = if matches!(condition, Condition::In(_)) { "IN" } else { "NOT IN" };
                if placeholders.is_empty() {
                    // An empty $in matches nothing; an empty $nin matches everything.
                    if keyword == "IN" {
                        "1 = 0".to_string()
                    } else {
                        "1 = 1".to_string()
                    }
                } else {
                    format!("{accessor} {keyword} ({})", placeholders.join(", "))
                }
            }
            Condition::Regex(pattern) => {
                let like_pattern = pattern.replace(".*", "%");
                let placeholder = bind(like_pattern, &mut params, &mut next_index);
                format!("{accessor} LIKE {placeholder}")
            }
            Condition::Exists(true) => format!("{accessor} IS NOT NULL"),
            Condition::Exists(false) => format!("{accessor} IS NULL"),
        };
        clauses.push(clause);
    }
    (format!(" WHERE {}", clauses.join(" AND ")), params)
}

pub fn render_order_limit(dialect: Dialect, options: &FindOptions) -> String {
    let mut sql = String::new();
    if !options.sort.is_empty() {
        let parts: Vec<String> = options
            .sort
            .iter()
            .map(|(field, ascending)| {
                let accessor = dialect.json_extract(field);
                format!("{accessor} {}", if *ascending { "ASC" } else { "DESC" })
            })
            .collect();
        sql.push_str(" ORDER BY ");
        sql.push_str(&parts.join(", "));
        // insertion order as the tie-breaker — spec.md §4.7 invariant.
        sql.push_str(", rowid ASC");
    } else {
        sql.push_str(" ORDER BY rowid ASC");
    }
    if let Some(limit) = options.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    if let Some(skip) = options.skip {
        if options.limit.is_none() {
            sql.push_str(" LIMIT -1");
        }
        sql.push_str(&format!(" OFFSET {skip}"));
    }
    sql
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_condition_renders_placeholder() {
        let filter = Filter::new().eq("title", Value::from("milk"));
        let (sql, params) = render_where(Dialect::Sqlite, &filter);
        assert!(sql.contains("json_extract(data, '$.title') = ?"));
        assert_eq!(params, vec!["milk".to_string()]);
    }

    #[test]
    fn postgres_dialect_uses_numbered_placeholders_and_arrow_accessor() {
        let filter = Filter::new().eq("title", Value::from("milk"));
        let (sql, _) = render_where(Dialect::Postgres, &filter);
        assert!(sql.contains("data ->> 'title' = $1"));
    }

    #[test]
    fn empty_in_matches_nothing() {
        let filter = Filter::new().where_cond("tag", Condition::In(Vec::new()));
        let (sql, _) = render_where(Dialect::Sqlite, &filter);
        assert!(sql.contains("1 = 0"));
    }

    #[test]
    fn regex_translates_dotstar_to_percent() {
        let filter = Filter::new().where_cond("title", Condition::Regex("^milk.*$".to_string()));
        let (sql, params) = render_where(Dialect::Sqlite, &filter);
        assert!(sql.contains("LIKE"));
        assert_eq!(params[0], "^milk%$");
    }
}
