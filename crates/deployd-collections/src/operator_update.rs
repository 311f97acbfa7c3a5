//! Detects and parses command updates (spec.md §4.3 "PUT /{id}": "If the
//! body contains any operator key beginning with `$`, execute as a command
//! update").

use deployd_core::{Document, Value};
use deployd_storage::UpdateSpec;

pub fn is_command_update(body: &Document) -> bool {
    body.keys().any(|key| key.starts_with('$'))
}

/// Parses a Mongo-shaped command body — `{"$inc": {"count": 1}, "$set": {...}}`
/// — into an [`UpdateSpec`]. Non-operator top-level keys are ignored; a
/// command update body is expected to contain only operator keys.
pub fn parse_update_spec(body: &Document) -> UpdateSpec {
    let mut spec = UpdateSpec::new();
    for (op, payload) in body.iter() {
        let Value::Object(fields) = payload else { continue };
        for (field, value) in fields.iter() {
            spec = match op.as_str() {
                "$set" => spec.set(field.clone(), value.clone()),
                "$inc" => spec.inc(field.clone(), value.as_f64().unwrap_or(0.0)),
                "$unset" => spec.unset(field.clone()),
                "$push" => spec.push(field.clone(), value.clone()),
                "$pull" => spec.pull(field.clone(), value.clone()),
                "$addToSet" => spec.add_to_set(field.clone(), value.clone()),
                _ => spec,
            };
        }
    }
    spec
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_command_update_by_dollar_prefixed_key() {
        let mut body = Document::new();
        let mut inc = Document::new();
        inc.insert("count", Value::Number(1.0));
        body.insert("$inc", Value::Object(inc));
        assert!(is_command_update(&body));
    }

    #[test]
    fn plain_body_is_not_a_command_update() {
        let mut body = Document::new();
        body.insert("title", Value::from("milk"));
        assert!(!is_command_update(&body));
    }

    #[test]
    fn parses_multiple_operators() {
        let mut body = Document::new();
        let mut inc = Document::new();
        inc.insert("count", Value::Number(2.0));
        let mut set = Document::new();
        set.insert("title", Value::from("milk"));
        body.insert("$inc", Value::Object(inc));
        body.insert("$set", Value::Object(set));
        let spec = parse_update_spec(&body);
        assert_eq!(spec.iter().count(), 2);
    }
}
