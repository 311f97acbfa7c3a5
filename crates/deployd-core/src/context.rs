//! `EventContext` — the mutable state threaded through a single request's
//! hook sequence (spec.md §3 "EventContext").
//!
//! Created per request by the Dispatcher, mutated by hooks in declared
//! order, consumed by the Collection Handler to build the response, then
//! discarded. Hooks reach it exclusively through the method-set documented
//! below (`cancel`, `error`, `hide`, `log`, `emit`); both the script runtime
//! and the compiled-plugin runtime bind to the same surface.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::identity::Identity;
use crate::value::{Document, Value};

/// HTTP method driving the current hook sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

/// One `log()` call recorded by a hook, forwarded to the metrics/log sink
/// after the hook returns (spec.md §5 "Shared resources").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub message: String,
    pub fields: Document,
}

/// One `emit()` call recorded by a hook, forwarded to the real-time
/// broadcast fabric's `emit` surface (spec.md §1 "Out of scope").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmitEntry {
    pub event: String,
    pub data: Value,
    pub room: Option<String>,
}

/// The cancellation state a hook may set via `cancel(message, status)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Cancellation {
    pub message: String,
    pub status: u16,
}

/// The mutable per-request state passed to every hook (spec.md §3).
#[derive(Debug, Clone)]
pub struct EventContext {
    pub method: Method,
    pub document: Document,
    pub query: Document,
    pub identity: Option<Identity>,
    errors: BTreeMap<String, String>,
    cancelled: Option<Cancellation>,
    hidden: HashSet<String>,
    logs: Vec<LogEntry>,
    emitted: Vec<EmitEntry>,
}

impl EventContext {
    pub fn new(method: Method, document: Document, query: Document, identity: Option<Identity>) -> Self {
        EventContext {
            method,
            document,
            query,
            identity,
            errors: BTreeMap::new(),
            cancelled: None,
            hidden: HashSet::new(),
            logs: Vec::new(),
            emitted: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.identity.as_ref().is_some_and(|i| i.is_root)
    }

    // ---- the hook method-set: {cancel, error, hide, log, emit} ----

    /// Terminates the current hook immediately and the remainder of the
    /// pipeline for this request (spec.md §5 "Cancellation").
    pub fn cancel(&mut self, message: impl Into<String>, status: u16) {
        if self.cancelled.is_none() {
            self.cancelled = Some(Cancellation {
                message: message.into(),
                status,
            });
        }
    }

    /// Records a field-level validation error. Only surfaced by hooks the
    /// hook table (spec.md §4.4) marks as able to surface validation errors.
    pub fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.insert(field.into(), message.into());
    }

    /// Removes `field` from the outgoing document and records it as hidden
    /// so a later hook copying from another source cannot reintroduce it
    /// (spec.md §9 "Hidden fields").
    pub fn hide(&mut self, field: impl Into<String>) {
        let field = field.into();
        self.document.remove(&field);
        self.hidden.insert(field);
    }

    pub fn log(&mut self, message: impl Into<String>, fields: Option<Document>) {
        self.logs.push(LogEntry {
            message: message.into(),
            fields: fields.unwrap_or_default(),
        });
    }

    pub fn emit(&mut self, event: impl Into<String>, data: Value, room: Option<String>) {
        self.emitted.push(EmitEntry {
            event: event.into(),
            data,
            room,
        });
    }

    // ---- accessors used by the pipeline/collection handler ----

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.is_some()
    }

    pub fn cancellation(&self) -> Option<&Cancellation> {
        self.cancelled.as_ref()
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn hidden_fields(&self) -> &HashSet<String> {
        &self.hidden
    }

    pub fn take_logs(&mut self) -> Vec<LogEntry> {
        std::mem::take(&mut self.logs)
    }

    pub fn take_emitted(&mut self) -> Vec<EmitEntry> {
        std::mem::take(&mut self.emitted)
    }

    /// Replaces the error map wholesale. Used by the pipeline to roll back
    /// errors a hook without `can_surface_validation_errors` tried to add
    /// (spec.md §4.4 hook capability table).
    pub fn set_errors(&mut self, errors: BTreeMap<String, String>) {
        self.errors = errors;
    }

    /// Clears any cancellation set during the hook just run. Used by the
    /// pipeline to enforce `can_cancel = false` (spec.md §4.4).
    pub fn clear_cancellation(&mut self) {
        self.cancelled = None;
    }

    /// The document as it should be returned to the client: hidden fields
    /// removed (spec.md §4.3 GET /{id}).
    pub fn visible_document(&self) -> Document {
        self.document.without_hidden(&self.hidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_keeps_first_reason() {
        let mut ctx = EventContext::new(Method::Post, Document::new(), Document::new(), None);
        ctx.cancel("first", 400);
        ctx.cancel("second", 403);
        assert_eq!(ctx.cancellation().unwrap().message, "first");
        assert_eq!(ctx.cancellation().unwrap().status, 400);
    }

    #[test]
    fn hide_removes_and_records() {
        let mut doc = Document::new();
        doc.insert("password", Value::from("secret"));
        let mut ctx = EventContext::new(Method::Get, doc, Document::new(), None);
        ctx.hide("password");
        assert!(!ctx.document.contains_key("password"));
        assert!(ctx.hidden_fields().contains("password"));
    }

    #[test]
    fn is_root_reads_identity() {
        let ctx = EventContext::new(
            Method::Get,
            Document::new(),
            Document::new(),
            Some(Identity::root()),
        );
        assert!(ctx.is_root());
    }
}
