//! Fire-and-forget `AfterCommit` scheduling (spec.md §4.4, §5: "must not
//! block the response; errors in AfterCommit are logged but never reach the
//! client").

use std::sync::Arc;

use deployd_core::EventContext;
use deployd_schema::HookKind;

use crate::dispatch::{HookSpec, Pipeline};

/// Spawns the AfterCommit hook on a background task. The caller's response
/// must already be finalized before calling this — nothing here is awaited
/// on the request's critical path.
pub fn schedule(pipeline: Arc<Pipeline>, collection: String, runtime: deployd_schema::Runtime, source: Option<String>, mut ctx: EventContext) {
    tokio::spawn(async move {
        let spec = HookSpec {
            collection: &collection,
            hook: HookKind::AfterCommit,
            runtime,
            source: source.as_deref(),
        };
        if let Err(fault) = pipeline.execute(spec, &mut ctx).await {
            tracing::warn!(collection = %collection, %fault, "afterCommit hook failed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use deployd_core::{Document, Method};
    use deployd_plugin::PluginManager;
    use deployd_schema::Runtime;
    use deployd_script::ScriptCache;

    #[tokio::test]
    async fn after_commit_failure_does_not_panic_the_spawner() {
        let tmp = std::env::temp_dir().join("deployd-after-commit-test");
        let pipeline = Arc::new(Pipeline::new(
            Arc::new(ScriptCache::new()),
            Arc::new(PluginManager::new(tmp.join("plugins"), tmp.join("deployd-plugin"))),
        ));
        let ctx = EventContext::new(Method::Post, Document::new(), Document::new(), None);
        schedule(
            pipeline,
            "todos".to_string(),
            Runtime::Script,
            Some("not valid rhai {{{".to_string()),
            ctx,
        );
        tokio::task::yield_now().await;
    }
}
