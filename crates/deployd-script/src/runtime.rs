//! Compiles and executes a hook script against an [`EventContext`] (spec.md
//! §4.5 "Script Runtime").

use std::sync::{Arc, Mutex};

use rhai::{Engine, Scope, AST};
use serde_json::Value as JsonValue;

use deployd_core::{Document, EngineError, EventContext, Identity};

use crate::host::{build_engine, HookEffects};

pub fn compile(source: &str) -> Result<AST, EngineError> {
    let engine = Engine::new();
    engine.compile(source).map_err(|e| EngineError::Build(e.to_string()))
}

/// Executes `ast` with a fresh VM bound to `ctx`, then folds the script's
/// mutations and method-set calls back into `ctx`. The VM (engine + scope)
/// is built fresh for this call; nothing about it survives past `run_hook`
/// returning (spec.md §4.5 "execution clones nothing of the prior run").
pub fn run_hook(ast: &AST, ctx: &mut EventContext) -> Result<(), EngineError> {
    let effects: Arc<Mutex<HookEffects>> = Arc::new(Mutex::new(HookEffects::default()));
    let engine = build_engine(effects.clone());

    let mut scope = Scope::new();
    let data_dynamic =
        rhai::serde::to_dynamic(ctx.document.to_json()).map_err(|e| EngineError::Internal(e.to_string()))?;
    let query_dynamic =
        rhai::serde::to_dynamic(ctx.query.to_json()).map_err(|e| EngineError::Internal(e.to_string()))?;
    let me_dynamic = match &ctx.identity {
        Some(identity) => {
            rhai::serde::to_dynamic(identity_json(identity)).map_err(|e| EngineError::Internal(e.to_string()))?
        }
        None => rhai::Dynamic::UNIT,
    };

    scope.push("data", data_dynamic);
    scope.push("query", query_dynamic);
    scope.push("me", me_dynamic);
    scope.push("isRoot", ctx.is_root());

    if let Err(err) = engine.eval_ast_with_scope::<rhai::Dynamic>(&mut scope, ast) {
        return Err(EngineError::Internal(format!("script fault: {err}")));
    }

    let data_out: rhai::Dynamic = scope
        .get_value("data")
        .ok_or_else(|| EngineError::Internal("script dropped `data` from scope".to_string()))?;
    let json_out: JsonValue =
        rhai::serde::from_dynamic(&data_out).map_err(|e| EngineError::Internal(e.to_string()))?;
    if let Some(document) = Document::from_json_object(json_out) {
        ctx.document = document;
    }

    apply_effects(ctx, effects);
    Ok(())
}

fn identity_json(identity: &Identity) -> JsonValue {
    serde_json::json!({
        "userId": identity.user_id,
        "username": identity.username,
        "isRoot": identity.is_root,
        "isAuthenticated": identity.is_authenticated,
    })
}

fn apply_effects(ctx: &mut EventContext, effects: Arc<Mutex<HookEffects>>) {
    let effects = Arc::try_unwrap(effects)
        .map(|m| m.into_inner().unwrap())
        .unwrap_or_default();

    if let Some((message, status)) = effects.cancelled {
        ctx.cancel(message, status.clamp(100, 599) as u16);
    }
    for (field, message) in effects.errors {
        ctx.error(field, message);
    }
    for field in effects.hidden {
        ctx.hide(field);
    }
    for (message, fields) in effects.logs {
        let fields = fields.and_then(Document::from_json_object);
        ctx.log(message, fields);
    }
    for (event, data, room) in effects.emits {
        ctx.emit(event, deployd_core::Value::from_json(data), room);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deployd_core::{Method, Value};

    #[test]
    fn script_mutates_document() {
        let ast = compile(r#"data.completed = true;"#).unwrap();
        let mut doc = Document::new();
        doc.insert("title", Value::from("milk"));
        let mut ctx = EventContext::new(Method::Post, doc, Document::new(), None);
        run_hook(&ast, &mut ctx).unwrap();
        assert_eq!(ctx.document.get("completed"), Some(&Value::Bool(true)));
    }

    #[test]
    fn script_can_cancel() {
        let ast = compile(r#"cancel("not allowed", 403);"#).unwrap();
        let mut ctx = EventContext::new(Method::Post, Document::new(), Document::new(), None);
        run_hook(&ast, &mut ctx).unwrap();
        assert!(ctx.is_cancelled());
        assert_eq!(ctx.cancellation().unwrap().status, 403);
    }

    #[test]
    fn script_sees_is_root_and_me() {
        let ast = compile(r#"if isRoot { data.seenRoot = true; } else { data.seenRoot = false; }"#).unwrap();
        let mut ctx = EventContext::new(Method::Get, Document::new(), Document::new(), Some(Identity::root()));
        run_hook(&ast, &mut ctx).unwrap();
        assert_eq!(ctx.document.get("seenRoot"), Some(&Value::Bool(true)));
    }

    #[test]
    fn script_can_hide_a_field() {
        let ast = compile(r#"hide("password");"#).unwrap();
        let mut doc = Document::new();
        doc.insert("password", Value::from("secret"));
        let mut ctx = EventContext::new(Method::Get, doc, Document::new(), None);
        run_hook(&ast, &mut ctx).unwrap();
        assert!(ctx.hidden_fields().contains("password"));
    }
}
