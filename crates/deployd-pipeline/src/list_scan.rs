//! Per-document Get-hook policy during a list scan, and `$skipEvents`
//! gating — the two points left open by spec.md and resolved here.

use deployd_core::EventContext;

/// Whether a document survives the Get hook during a list scan.
///
/// Resolution of the open question "what happens to a list-query Get-hook
/// validation error": the Get hook's capability table marks it unable to
/// surface validation errors at all, but a hook body may still call
/// `error()`. Treated the same as cancellation — the document is dropped
/// from the result set rather than turning one bad document into a
/// whole-request 400, which would make a single corrupt row take down an
/// entire list response.
pub fn list_get_outcome(ctx: &EventContext) -> ListGetOutcome {
    if ctx.is_cancelled() || ctx.has_errors() {
        ListGetOutcome::Drop
    } else {
        ListGetOutcome::Keep
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListGetOutcome {
    Keep,
    Drop,
}

/// Resolution of the open question "does `$skipEvents` apply to reads":
/// bypassing the Get hook on read means a client can read fields the
/// collection's own Get hook would otherwise hide or filter, so the
/// bypass is restricted to root. A non-root identity's `$skipEvents`
/// request is ignored rather than rejected — the read still happens, just
/// with the Get hook intact.
pub fn skip_events_applies(requested: bool, is_root: bool) -> bool {
    requested && is_root
}

#[cfg(test)]
mod tests {
    use super::*;
    use deployd_core::{Document, Method};

    #[test]
    fn cancelled_document_is_dropped() {
        let mut ctx = EventContext::new(Method::Get, Document::new(), Document::new(), None);
        ctx.cancel("nope", 403);
        assert_eq!(list_get_outcome(&ctx), ListGetOutcome::Drop);
    }

    #[test]
    fn error_without_cancel_is_also_dropped() {
        let mut ctx = EventContext::new(Method::Get, Document::new(), Document::new(), None);
        ctx.error("field", "bad");
        assert_eq!(list_get_outcome(&ctx), ListGetOutcome::Drop);
    }

    #[test]
    fn untouched_document_is_kept() {
        let ctx = EventContext::new(Method::Get, Document::new(), Document::new(), None);
        assert_eq!(list_get_outcome(&ctx), ListGetOutcome::Keep);
    }

    #[test]
    fn skip_events_requires_root() {
        assert!(!skip_events_applies(true, false));
        assert!(skip_events_applies(true, true));
        assert!(!skip_events_applies(false, true));
    }
}
