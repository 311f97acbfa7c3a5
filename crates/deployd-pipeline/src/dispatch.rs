//! Resolves a hook to its runtime and executes it, with the panic boundary
//! and fault-surfacing policy of spec.md §4.4/§4.6/§7.

use std::sync::Arc;

use deployd_core::{Document, EngineError, EventContext, Value};
use deployd_schema::{HookKind, Runtime};
use deployd_plugin::{PluginIdentity, PluginKey, PluginManager, PluginRequest, PluginResponse};
use deployd_script::{ScriptCache, ScriptKey};

use crate::emit_sink::EmitSink;
use crate::hook_table::{capabilities, fault_is_client_visible};

/// Capacity of the shared [`EmitSink`] (spec.md §5): a generous but bounded
/// backlog, tuned by the drop-oldest policy rather than by blocking hooks.
const EMIT_SINK_CAPACITY: usize = 1024;

pub struct Pipeline {
    script_cache: Arc<ScriptCache>,
    plugin_manager: Arc<PluginManager>,
    emit_sink: Arc<EmitSink>,
}

pub struct HookSpec<'a> {
    pub collection: &'a str,
    pub hook: HookKind,
    pub runtime: Runtime,
    pub source: Option<&'a str>,
}

impl Pipeline {
    pub fn new(script_cache: Arc<ScriptCache>, plugin_manager: Arc<PluginManager>) -> Self {
        Pipeline {
            script_cache,
            plugin_manager,
            emit_sink: Arc::new(EmitSink::new(EMIT_SINK_CAPACITY)),
        }
    }

    /// The shared emit sink every `emit()` call is drained into. A real-time
    /// broadcast fabric (out of scope here, per spec.md §1) would subscribe
    /// via [`EmitSink::recv`].
    pub fn emit_sink(&self) -> &Arc<EmitSink> {
        &self.emit_sink
    }

    /// Runs the hook named by `spec` against `ctx`. A `None` source is a
    /// no-op success — the collection simply has nothing declared for this
    /// hook.
    pub async fn execute(&self, spec: HookSpec<'_>, ctx: &mut EventContext) -> Result<(), EngineError> {
        let Some(source) = spec.source else {
            return Ok(());
        };

        let caps = capabilities(spec.hook);
        let restore_document = (!caps.can_mutate_document).then(|| ctx.document.clone());
        let restore_errors = (!caps.can_surface_validation_errors).then(|| ctx.errors().clone());
        let was_cancelled = ctx.is_cancelled();

        let outcome = match spec.runtime {
            Runtime::Script => self.execute_script(spec.collection, spec.hook, source, ctx),
            Runtime::Compiled => self.execute_compiled(spec.collection, spec.hook, source, ctx).await,
        };

        self.drain_sinks(spec.collection, spec.hook, ctx);
        self.enforce_capabilities(caps, ctx, restore_document, restore_errors, was_cancelled);

        match outcome {
            Ok(()) => Ok(()),
            Err(fault) => self.handle_fault(spec.hook, fault),
        }
    }

    /// Rolls back whatever a hook attempted that its capability table entry
    /// (spec.md §4.4) does not grant it: a mutated document, newly surfaced
    /// validation errors, or a cancellation.
    fn enforce_capabilities(
        &self,
        caps: crate::hook_table::HookCapabilities,
        ctx: &mut EventContext,
        restore_document: Option<Document>,
        restore_errors: Option<std::collections::BTreeMap<String, String>>,
        was_cancelled: bool,
    ) {
        if let Some(document) = restore_document {
            ctx.document = document;
        }
        if let Some(errors) = restore_errors {
            ctx.set_errors(errors);
        }
        if !caps.can_cancel && !was_cancelled {
            ctx.clear_cancellation();
        }
    }

    /// Forwards a hook's `log()`/`emit()` calls to their ambient sinks
    /// (spec.md §5): logs become `tracing` events under the `hook` target,
    /// emits land in the bounded [`EmitSink`].
    fn drain_sinks(&self, collection: &str, hook: HookKind, ctx: &mut EventContext) {
        for entry in ctx.take_logs() {
            tracing::info!(
                target: "hook",
                collection,
                hook = hook.file_name(),
                fields = %entry.fields.to_json(),
                "{}",
                entry.message,
            );
        }
        for entry in ctx.take_emitted() {
            self.emit_sink.publish(entry);
        }
    }

    fn execute_script(
        &self,
        collection: &str,
        hook: HookKind,
        source: &str,
        ctx: &mut EventContext,
    ) -> Result<(), EngineError> {
        let key = ScriptKey::new(collection, hook.file_name());
        let ast = match self.script_cache.get(&key) {
            Some(ast) => ast,
            None => {
                let compiled = deployd_script::compile(source)?;
                self.script_cache.insert(key, compiled)
            }
        };

        // Script bodies run user-authored host-function closures; a
        // misbehaving closure (e.g. a poisoned lock) must not take the
        // request's task down with it.
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| deployd_script::run_hook(&ast, ctx))) {
            Ok(result) => result,
            Err(_) => Err(EngineError::Internal(format!("{collection}/{}: hook panicked", hook.file_name()))),
        }
    }

    async fn execute_compiled(
        &self,
        collection: &str,
        hook: HookKind,
        source: &str,
        ctx: &mut EventContext,
    ) -> Result<(), EngineError> {
        let key = PluginKey::new(collection, hook.file_name());
        let request = to_plugin_request(ctx);
        let response = self.plugin_manager.invoke(&key, source, &request).await?;
        apply_plugin_response(ctx, response);
        Ok(())
    }

    fn handle_fault(&self, hook: HookKind, fault: EngineError) -> Result<(), EngineError> {
        fault.log();
        if fault_is_client_visible(hook) {
            Err(fault)
        } else {
            tracing::warn!(hook = hook.file_name(), %fault, "hook fault swallowed on a non-write hook");
            Ok(())
        }
    }
}

fn to_plugin_request(ctx: &EventContext) -> PluginRequest {
    PluginRequest {
        method: ctx.method.as_str().to_string(),
        document: ctx.document.to_json(),
        query: ctx.query.to_json(),
        identity: ctx.identity.as_ref().map(|identity| PluginIdentity {
            user_id: identity.user_id.clone(),
            username: identity.username.clone(),
            is_root: identity.is_root,
        }),
    }
}

fn apply_plugin_response(ctx: &mut EventContext, response: PluginResponse) {
    if let Some(document) = response.document.and_then(Document::from_json_object) {
        ctx.document = document;
    }
    if let Some(cancellation) = response.cancelled {
        ctx.cancel(cancellation.message, cancellation.status);
    }
    for (field, message) in response.errors {
        ctx.error(field, message);
    }
    for field in response.hidden {
        ctx.hide(field);
    }
    for (message, fields) in response.logs {
        ctx.log(message, fields.and_then(Document::from_json_object));
    }
    for (event, data, room) in response.emits {
        ctx.emit(event, Value::from_json(data), room);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deployd_core::Method;

    fn pipeline(tmp_dir: &std::path::Path) -> Pipeline {
        Pipeline::new(
            Arc::new(ScriptCache::new()),
            Arc::new(PluginManager::new(tmp_dir.join("plugins"), tmp_dir.join("deployd-plugin"))),
        )
    }

    #[tokio::test]
    async fn no_source_is_a_no_op() {
        let tmp = tempfile_dir();
        let pipeline = pipeline(&tmp);
        let mut ctx = EventContext::new(Method::Get, Document::new(), Document::new(), None);
        let spec = HookSpec {
            collection: "todos",
            hook: HookKind::Get,
            runtime: Runtime::Script,
            source: None,
        };
        pipeline.execute(spec, &mut ctx).await.unwrap();
        assert!(!ctx.is_cancelled());
    }

    #[tokio::test]
    async fn script_hook_mutates_document() {
        let tmp = tempfile_dir();
        let pipeline = pipeline(&tmp);
        let mut ctx = EventContext::new(Method::Post, Document::new(), Document::new(), None);
        let spec = HookSpec {
            collection: "todos",
            hook: HookKind::Post,
            runtime: Runtime::Script,
            source: Some(r#"data.completed = false;"#),
        };
        pipeline.execute(spec, &mut ctx).await.unwrap();
        assert_eq!(ctx.document.get("completed"), Some(&Value::Bool(false)));
    }

    #[tokio::test]
    async fn log_and_emit_are_drained_from_the_context() {
        let tmp = tempfile_dir();
        let pipeline = pipeline(&tmp);
        let mut ctx = EventContext::new(Method::Post, Document::new(), Document::new(), None);
        let spec = HookSpec {
            collection: "todos",
            hook: HookKind::Post,
            runtime: Runtime::Script,
            source: Some(r#"log("created a todo"); emit("todo.created", data);"#),
        };
        pipeline.execute(spec, &mut ctx).await.unwrap();

        assert!(ctx.take_logs().is_empty());
        assert!(ctx.take_emitted().is_empty());
        let emitted = pipeline.emit_sink().recv().await.unwrap();
        assert_eq!(emitted.event, "todo.created");
    }

    #[tokio::test]
    async fn before_request_cannot_surface_validation_errors() {
        let tmp = tempfile_dir();
        let pipeline = pipeline(&tmp);
        let mut ctx = EventContext::new(Method::Post, Document::new(), Document::new(), None);
        let spec = HookSpec {
            collection: "todos",
            hook: HookKind::BeforeRequest,
            runtime: Runtime::Script,
            source: Some(r#"error("title", "not allowed here");"#),
        };
        pipeline.execute(spec, &mut ctx).await.unwrap();
        assert!(!ctx.has_errors());
    }

    #[tokio::test]
    async fn delete_hook_cannot_mutate_document() {
        let tmp = tempfile_dir();
        let pipeline = pipeline(&tmp);
        let mut doc = Document::new();
        doc.insert("title", Value::from("buy milk"));
        let mut ctx = EventContext::new(Method::Delete, doc, Document::new(), None);
        let spec = HookSpec {
            collection: "todos",
            hook: HookKind::Delete,
            runtime: Runtime::Script,
            source: Some(r#"data.title = "tampered";"#),
        };
        pipeline.execute(spec, &mut ctx).await.unwrap();
        assert_eq!(ctx.document.get("title"), Some(&Value::from("buy milk")));
    }

    #[tokio::test]
    async fn after_commit_hook_cannot_cancel() {
        let tmp = tempfile_dir();
        let pipeline = pipeline(&tmp);
        let mut ctx = EventContext::new(Method::Post, Document::new(), Document::new(), None);
        let spec = HookSpec {
            collection: "todos",
            hook: HookKind::AfterCommit,
            runtime: Runtime::Script,
            source: Some(r#"cancel("nope", 400);"#),
        };
        pipeline.execute(spec, &mut ctx).await.unwrap();
        assert!(!ctx.is_cancelled());
    }

    #[tokio::test]
    async fn script_build_fault_on_get_is_swallowed() {
        let tmp = tempfile_dir();
        let pipeline = pipeline(&tmp);
        let mut ctx = EventContext::new(Method::Get, Document::new(), Document::new(), None);
        let spec = HookSpec {
            collection: "todos",
            hook: HookKind::Get,
            runtime: Runtime::Script,
            source: Some("this is not valid rhai syntax {{{"),
        };
        assert!(pipeline.execute(spec, &mut ctx).await.is_ok());
    }

    #[tokio::test]
    async fn script_build_fault_on_post_surfaces() {
        let tmp = tempfile_dir();
        let pipeline = pipeline(&tmp);
        let mut ctx = EventContext::new(Method::Post, Document::new(), Document::new(), None);
        let spec = HookSpec {
            collection: "todos",
            hook: HookKind::Post,
            runtime: Runtime::Script,
            source: Some("this is not valid rhai syntax {{{"),
        };
        assert!(pipeline.execute(spec, &mut ctx).await.is_err());
    }

    fn tempfile_dir() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("deployd-pipeline-test-{}", uuid_like()))
    }

    fn uuid_like() -> String {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos().to_string()
    }
}
