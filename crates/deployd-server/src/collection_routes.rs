//! Generic dispatch onto `/<collection>[/<id>|/count][/<parts...>]` (spec.md
//! §4.1 "Dispatcher", §6 "HTTP surface").

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value as JsonValue;

use deployd_collections::CollectionService;
use deployd_core::{Document, EngineError, Identity, Value};

use crate::auth::{bearer_token, master_key_header};
use crate::state::AppState;

fn identity_of(state: &AppState, headers: &HeaderMap) -> Option<Identity> {
    let identity = state.adjudicator.adjudicate(deployd_security::Credentials {
        bearer_token: bearer_token(headers),
        master_key: master_key_header(headers),
    });
    (!identity.is_anonymous()).then_some(identity)
}

/// Parses a raw `?a=1&b=2` query string into a [`Document`], the shape
/// `sanitize_filter`/`query_options` expect. `$sort`/`$fields` arrive as
/// JSON-encoded values (spec.md §6: "`$sort` (JSON object ...)").
fn parse_query(raw: Option<&str>) -> Document {
    let mut document = Document::new();
    let Some(raw) = raw else { return document };
    for pair in raw.split('&').filter(|p| !p.is_empty()) {
        let mut parts = pair.splitn(2, '=');
        let Some(key) = parts.next() else { continue };
        let raw_value = parts.next().unwrap_or("");
        let decoded_key = percent_decode(key);
        let decoded_value = percent_decode(raw_value);
        let value = serde_json::from_str::<JsonValue>(&decoded_value)
            .map(Value::from_json)
            .unwrap_or_else(|_| Value::from(decoded_value.as_str()));
        document.insert(decoded_key, value);
    }
    document
}

fn percent_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                if let Ok(byte) = u8::from_str_radix(&raw[i + 1..i + 3], 16) {
                    out.push(byte);
                    i += 3;
                } else {
                    out.push(bytes[i]);
                    i += 1;
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Splits the request path into non-empty segments.
fn path_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Selects the resource whose registered path is the longest prefix of
/// `segments` (spec.md §4.1). Registered paths are collection names, each a
/// single segment today, but the walk itself does not assume that — it
/// tries the longest candidate first and shortens until one resolves.
fn resolve<'a>(
    state: &AppState,
    segments: &'a [&'a str],
) -> Option<(Arc<CollectionService>, &'a [&'a str])> {
    for split in (1..=segments.len()).rev() {
        let candidate = segments[..split].join("/");
        if let Some(service) = state.collections.get(&candidate) {
            return Some((service.clone(), &segments[split..]));
        }
    }
    None
}

fn not_found(path: &str) -> Response {
    EngineError::NotFound(format!("no collection registered for {path:?}")).into_response()
}

fn method_not_allowed() -> Response {
    let body = serde_json::json!({
        "error": true,
        "message": "method not allowed",
        "status": StatusCode::METHOD_NOT_ALLOWED.as_u16(),
    });
    (StatusCode::METHOD_NOT_ALLOWED, Json(body)).into_response()
}

fn bad_json_body(err: serde_json::Error) -> Response {
    let mut errors = BTreeMap::new();
    errors.insert("body".to_string(), err.to_string());
    EngineError::Validation(errors).into_response()
}

/// Inserts the suffix segments after the id, if any, under `query["parts"]`
/// (spec.md §4.1: "for nested paths, a `parts` array placed into the
/// EventContext query mapping under the key `parts`").
fn with_parts(mut raw_query: Document, parts: &[&str]) -> Document {
    if !parts.is_empty() {
        let values = parts.iter().map(|part| Value::from(*part)).collect();
        raw_query.insert("parts", Value::Array(values));
    }
    raw_query
}

/// The single fallback route every request except `/auth/*` lands on. Does
/// its own method dispatch since the matched resource, not the axum router,
/// determines which verbs are meaningful past this point.
pub async fn dispatch(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: axum::body::Bytes,
) -> Response {
    let path = uri.path().to_string();
    let segments = path_segments(&path);
    let Some((service, suffix)) = resolve(&state, &segments) else {
        return not_found(&path);
    };

    let raw_query = parse_query(query.as_deref());
    let identity = identity_of(&state, &headers);

    if suffix.is_empty() {
        return match method {
            Method::GET => match service.get_list(&raw_query, identity).await {
                Ok(documents) => Json(documents).into_response(),
                Err(err) => err.into_response(),
            },
            Method::POST => {
                let document = match serde_json::from_slice::<Document>(&body) {
                    Ok(document) => document,
                    Err(err) => return bad_json_body(err),
                };
                match service.post(document, identity).await {
                    Ok(document) => Json(document).into_response(),
                    Err(err) => err.into_response(),
                }
            }
            _ => method_not_allowed(),
        };
    }

    if suffix == ["count"] {
        return match method {
            Method::GET => {
                if !identity.as_ref().is_some_and(|i| i.is_root) {
                    return EngineError::Forbidden("GET /<collection>/count is root-only".to_string()).into_response();
                }
                match service.count(&raw_query).await {
                    Ok(n) => Json(serde_json::json!({ "count": n })).into_response(),
                    Err(err) => err.into_response(),
                }
            }
            _ => method_not_allowed(),
        };
    }

    let id = suffix[0];
    let raw_query = with_parts(raw_query, &suffix[1..]);

    match method {
        Method::GET => match service.get_by_id(id, &raw_query, identity).await {
            Ok(document) => Json(document).into_response(),
            Err(err) => err.into_response(),
        },
        Method::PUT => {
            let document = match serde_json::from_slice::<Document>(&body) {
                Ok(document) => document,
                Err(err) => return bad_json_body(err),
            };
            match service.put(id, &raw_query, document, identity).await {
                Ok(document) => Json(document).into_response(),
                Err(err) => err.into_response(),
            }
        }
        Method::DELETE => match service.delete(id, &raw_query, identity).await {
            Ok(result) => Json(serde_json::json!({ "deleted": result.deleted })).into_response(),
            Err(err) => err.into_response(),
        },
        _ => method_not_allowed(),
    }
}
