//! Sandboxed per-request rhai interpreter runtime for scripted hooks
//! (spec.md §4.5 "Script Runtime").

pub mod cache;
pub mod host;
pub mod runtime;

pub use cache::{ScriptCache, ScriptKey};
pub use runtime::{compile, run_hook};
