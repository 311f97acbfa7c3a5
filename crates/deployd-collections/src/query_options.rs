//! Splits a raw query mapping into the reserved options (spec.md §4.3
//! "GET (list)": `$sort`, `$limit`, `$skip`, `$fields`) and the
//! `$skipEvents` flag, leaving the remainder for [`deployd_storage::sanitize_filter`].

use deployd_core::{Document, Value};
use deployd_storage::FindOptions;

pub fn parse_find_options(raw: &Document) -> FindOptions {
    let sort = match raw.get("$sort") {
        Some(Value::Object(fields)) => fields
            .iter()
            .filter_map(|(field, direction)| {
                direction.as_f64().map(|n| (field.clone(), n >= 0.0))
            })
            .collect(),
        _ => Vec::new(),
    };
    let limit = raw.get("$limit").and_then(Value::as_f64).map(|n| n.max(0.0) as u64);
    let skip = raw.get("$skip").and_then(Value::as_f64).map(|n| n.max(0.0) as u64);
    let fields = parse_fields(raw.get("$fields"));
    FindOptions { sort, limit, skip, fields }
}

/// `$fields` (spec.md §6: "JSON object or comma list") — a `{"title":1}`
/// projection object keeps only its truthy keys, a `"title,completed"`
/// string splits on commas.
fn parse_fields(raw: Option<&Value>) -> Option<Vec<String>> {
    let names: Vec<String> = match raw {
        Some(Value::Object(fields)) => fields
            .iter()
            .filter(|(_, included)| included.as_f64().map(|n| n != 0.0).unwrap_or(true))
            .map(|(field, _)| field.clone())
            .collect(),
        Some(Value::String(csv)) => csv.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect(),
        _ => Vec::new(),
    };
    (!names.is_empty()).then_some(names)
}

pub fn extract_skip_events(raw: &Document) -> bool {
    raw.get("$skipEvents").and_then(Value::as_bool).unwrap_or(false)
}

/// Applies a `$fields` projection, always preserving `id` — a client can
/// narrow a response but never hide the identifier it needs for follow-up
/// requests.
pub fn apply_projection(document: Document, fields: Option<&[String]>) -> Document {
    let Some(fields) = fields else {
        return document;
    };
    document
        .into_iter()
        .filter(|(key, _)| key == "id" || fields.iter().any(|f| f == key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sort_limit_skip() {
        let mut raw = Document::new();
        let mut sort = Document::new();
        sort.insert("title", Value::Number(1.0));
        raw.insert("$sort", Value::Object(sort));
        raw.insert("$limit", Value::Number(10.0));
        raw.insert("$skip", Value::Number(5.0));
        let options = parse_find_options(&raw);
        assert_eq!(options.sort, vec![("title".to_string(), true)]);
        assert_eq!(options.limit, Some(10));
        assert_eq!(options.skip, Some(5));
    }

    #[test]
    fn projection_always_keeps_id() {
        let mut doc = Document::new();
        doc.insert("id", Value::from("1"));
        doc.insert("title", Value::from("milk"));
        doc.insert("secret", Value::from("x"));
        let projected = apply_projection(doc, Some(&["title".to_string()]));
        assert!(projected.contains_key("id"));
        assert!(projected.contains_key("title"));
        assert!(!projected.contains_key("secret"));
    }

    #[test]
    fn skip_events_defaults_to_false() {
        assert!(!extract_skip_events(&Document::new()));
    }

    #[test]
    fn fields_object_form_keeps_truthy_keys() {
        let mut raw = Document::new();
        let mut fields = Document::new();
        fields.insert("title", Value::Number(1.0));
        fields.insert("secret", Value::Number(0.0));
        raw.insert("$fields", Value::Object(fields));
        let options = parse_find_options(&raw);
        assert_eq!(options.fields, Some(vec!["title".to_string()]));
    }

    #[test]
    fn fields_comma_list_form() {
        let mut raw = Document::new();
        raw.insert("$fields", Value::from("title, completed"));
        let options = parse_find_options(&raw);
        assert_eq!(options.fields, Some(vec!["title".to_string(), "completed".to_string()]));
    }
}
