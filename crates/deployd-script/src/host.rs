//! Host functions bound into every script VM (spec.md §4.4 "Hook contract",
//! §4.5 "Script Runtime"): `cancel`, `error`, `hide`, `log`, `emit`, plus a
//! fixed `require` allowlist of elementary utilities.

use std::sync::{Arc, Mutex};

use rhai::Engine;
use serde_json::Value as JsonValue;

#[derive(Debug, Default)]
pub struct HookEffects {
    pub cancelled: Option<(String, i64)>,
    pub errors: Vec<(String, String)>,
    pub hidden: Vec<String>,
    pub logs: Vec<(String, Option<JsonValue>)>,
    pub emits: Vec<(String, JsonValue, Option<String>)>,
}

pub type SharedEffects = Arc<Mutex<HookEffects>>;

/// Registers the hook method-set and the `require` allowlist on a fresh
/// engine instance. A new `Engine` (and therefore a fresh allowlist) is
/// built per request — no process-wide scripting state (spec.md §4.5).
pub fn build_engine(effects: SharedEffects) -> Engine {
    let mut engine = Engine::new();
    engine.set_max_operations(2_000_000);
    engine.set_max_expr_depths(64, 32);

    {
        let effects = effects.clone();
        engine.register_fn("cancel", move |message: &str, status: i64| {
            let mut effects = effects.lock().unwrap();
            if effects.cancelled.is_none() {
                effects.cancelled = Some((message.to_string(), status));
            }
        });
    }
    {
        let effects = effects.clone();
        engine.register_fn("cancel", move |message: &str| {
            let mut effects = effects.lock().unwrap();
            if effects.cancelled.is_none() {
                effects.cancelled = Some((message.to_string(), 400));
            }
        });
    }
    {
        let effects = effects.clone();
        engine.register_fn("error", move |field: &str, message: &str| {
            effects.lock().unwrap().errors.push((field.to_string(), message.to_string()));
        });
    }
    {
        let effects = effects.clone();
        engine.register_fn("hide", move |field: &str| {
            effects.lock().unwrap().hidden.push(field.to_string());
        });
    }
    {
        let effects = effects.clone();
        engine.register_fn("log", move |message: &str| {
            effects.lock().unwrap().logs.push((message.to_string(), None));
        });
    }
    {
        let effects = effects.clone();
        engine.register_fn("log", move |message: &str, fields: rhai::Map| {
            let json = rhai::serde::from_dynamic::<JsonValue>(&fields.into()).ok();
            effects.lock().unwrap().logs.push((message.to_string(), json));
        });
    }
    {
        let effects = effects.clone();
        engine.register_fn("emit", move |event: &str, data: rhai::Dynamic| {
            let json = rhai::serde::from_dynamic::<JsonValue>(&data).unwrap_or(JsonValue::Null);
            effects.lock().unwrap().emits.push((event.to_string(), json, None));
        });
    }
    {
        let effects = effects.clone();
        engine.register_fn("emit", move |event: &str, data: rhai::Dynamic, room: &str| {
            let json = rhai::serde::from_dynamic::<JsonValue>(&data).unwrap_or(JsonValue::Null);
            effects.lock().unwrap().emits.push((event.to_string(), json, Some(room.to_string())));
        });
    }

    register_require_allowlist(&mut engine);
    engine
}

/// A fixed set of utilities standing in for the original's `require`
/// surface — no arbitrary module resolution is exposed (spec.md §4.5).
fn register_require_allowlist(engine: &mut Engine) {
    engine.register_fn("uuid", || uuid::Uuid::new_v4().to_string());
    engine.register_fn("random_bytes_hex", |count: i64| {
        let count = count.clamp(0, 4096) as usize;
        let mut bytes = vec![0u8; count];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        hex_encode(&bytes)
    });
    engine.register_fn("is_string", |value: rhai::Dynamic| value.is_string());
    engine.register_fn("is_array", |value: rhai::Dynamic| value.is_array());
    engine.register_fn("is_object_map", |value: rhai::Dynamic| value.is_map());
    engine.register_fn("is_number", |value: rhai::Dynamic| {
        value.is_int() || value.is_float()
    });
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_keeps_first_call() {
        let effects: SharedEffects = Arc::new(Mutex::new(HookEffects::default()));
        let engine = build_engine(effects.clone());
        engine.eval::<()>(r#"cancel("nope", 403); cancel("again", 500);"#).unwrap();
        let effects = effects.lock().unwrap();
        assert_eq!(effects.cancelled, Some(("nope".to_string(), 403)));
    }

    #[test]
    fn uuid_is_callable_from_script() {
        let effects: SharedEffects = Arc::new(Mutex::new(HookEffects::default()));
        let engine = build_engine(effects);
        let id: String = engine.eval("uuid()").unwrap();
        assert_eq!(id.len(), 36);
    }
}
