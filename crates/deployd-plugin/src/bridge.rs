//! The types a generated plugin crate links against (spec.md §4.6: "the
//! plugin is compiled against its own copy of the EventContext type").
//! `HookContext` is deliberately a separate type from
//! `deployd_core::EventContext` — the plugin never shares the host's type
//! definition, only the JSON shape of [`crate::envelope`].

use std::collections::HashMap;

use serde_json::{Map, Value as JsonValue};

use crate::envelope::{PluginCancellation, PluginIdentity, PluginRequest, PluginResponse};

pub struct HookContext {
    pub method: String,
    pub document: Map<String, JsonValue>,
    pub query: Map<String, JsonValue>,
    pub identity: Option<PluginIdentity>,
    cancelled: Option<PluginCancellation>,
    errors: Vec<(String, String)>,
    hidden: Vec<String>,
    logs: Vec<(String, Option<JsonValue>)>,
    emits: Vec<(String, JsonValue, Option<String>)>,
}

impl HookContext {
    pub fn from_envelope_bytes(bytes: &[u8]) -> Result<HookContext, String> {
        let request: PluginRequest = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
        let document = match request.document {
            JsonValue::Object(map) => map,
            _ => Map::new(),
        };
        let query = match request.query {
            JsonValue::Object(map) => map,
            _ => Map::new(),
        };
        Ok(HookContext {
            method: request.method,
            document,
            query,
            identity: request.identity,
            cancelled: None,
            errors: Vec::new(),
            hidden: Vec::new(),
            logs: Vec::new(),
            emits: Vec::new(),
        })
    }

    pub fn is_root(&self) -> bool {
        self.identity.as_ref().is_some_and(|i| i.is_root)
    }

    pub fn cancel(&mut self, message: impl Into<String>, status: u16) {
        if self.cancelled.is_none() {
            self.cancelled = Some(PluginCancellation {
                message: message.into(),
                status,
            });
        }
    }

    pub fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push((field.into(), message.into()));
    }

    pub fn hide(&mut self, field: impl Into<String>) {
        let field = field.into();
        self.document.remove(&field);
        self.hidden.push(field);
    }

    pub fn log(&mut self, message: impl Into<String>, fields: Option<HashMap<String, JsonValue>>) {
        self.logs.push((
            message.into(),
            fields.map(|f| JsonValue::Object(f.into_iter().collect())),
        ));
    }

    pub fn emit(&mut self, event: impl Into<String>, data: JsonValue, room: Option<String>) {
        self.emits.push((event.into(), data, room));
    }

    pub fn into_response(self) -> PluginResponse {
        PluginResponse {
            document: Some(JsonValue::Object(self.document)),
            hidden: self.hidden,
            cancelled: self.cancelled,
            errors: self.errors,
            logs: self.logs,
            emits: self.emits,
        }
    }

    /// Produced when the envelope itself cannot be decoded — a build-level
    /// fault, not a hook decision, so the host treats it the same as a
    /// loader fault (spec.md §4.6 step 4).
    pub fn fault_response(message: &str) -> PluginResponse {
        PluginResponse {
            cancelled: Some(PluginCancellation {
                message: format!("plugin bridge fault: {message}"),
                status: 500,
            }),
            ..Default::default()
        }
    }
}

/// Serializes `response`, leaks it as an owned buffer, and writes its
/// length through `out_len`. Paired with [`crate::envelope::PluginFreeFn`]
/// on the host side so the allocation is freed by the allocator that made
/// it.
///
/// # Safety
/// `out_len` must be a valid, aligned, writable `*mut usize`.
pub unsafe fn respond(out_len: *mut usize, response: &PluginResponse) -> *mut u8 {
    let bytes = serde_json::to_vec(response).unwrap_or_default();
    let mut boxed = bytes.into_boxed_slice();
    let ptr = boxed.as_mut_ptr();
    *out_len = boxed.len();
    std::mem::forget(boxed);
    ptr
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_minimal_envelope() {
        let json = serde_json::json!({
            "method": "POST",
            "document": {"title": "milk"},
            "query": {},
            "identity": null,
        });
        let bytes = serde_json::to_vec(&json).unwrap();
        let ctx = HookContext::from_envelope_bytes(&bytes).unwrap();
        assert_eq!(ctx.document.get("title").unwrap(), "milk");
        assert!(!ctx.is_root());
    }

    #[test]
    fn hide_removes_from_document_and_records() {
        let json = serde_json::json!({
            "method": "GET",
            "document": {"password": "secret"},
            "query": {},
            "identity": null,
        });
        let bytes = serde_json::to_vec(&json).unwrap();
        let mut ctx = HookContext::from_envelope_bytes(&bytes).unwrap();
        ctx.hide("password");
        let response = ctx.into_response();
        assert_eq!(response.hidden, vec!["password".to_string()]);
        assert_eq!(response.document.unwrap().get("password"), None);
    }
}
