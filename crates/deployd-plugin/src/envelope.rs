//! The JSON envelope that crosses the dylib boundary (spec.md §4.6 "The
//! reflection bridge exists because the plugin is compiled against its own
//! copy of the EventContext type"). Field-by-field struct reflection across
//! an FFI boundary between two independently compiled crates is unsound in
//! real Rust (no stable ABI, no shared `TypeId`); a serialized envelope is
//! the safe realization of the same idea — ctx fields cross as plain data,
//! not as a shared struct layout.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Serialize, Deserialize)]
pub struct PluginRequest {
    pub method: String,
    pub document: JsonValue,
    pub query: JsonValue,
    pub identity: Option<PluginIdentity>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PluginIdentity {
    pub user_id: String,
    pub username: String,
    pub is_root: bool,
}

/// The mutated fields a plugin may hand back — document, hidden-fields set,
/// and the hook method-set calls (spec.md §4.6 "copies mutated fields ...
/// back into the host structure").
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PluginResponse {
    pub document: Option<JsonValue>,
    #[serde(default)]
    pub hidden: Vec<String>,
    #[serde(default)]
    pub cancelled: Option<PluginCancellation>,
    #[serde(default)]
    pub errors: Vec<(String, String)>,
    #[serde(default)]
    pub logs: Vec<(String, Option<JsonValue>)>,
    #[serde(default)]
    pub emits: Vec<(String, JsonValue, Option<String>)>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PluginCancellation {
    pub message: String,
    pub status: u16,
}

/// The symbol every compiled plugin exports: takes the request envelope as
/// a UTF-8 JSON byte buffer, writes the response envelope's length through
/// `out_len`, and returns an owned buffer the host must free via
/// [`PluginFreeFn`]. The plugin's own allocator produced the buffer; the
/// host's allocator must not be the one to free it.
pub type PluginEntryPoint = unsafe extern "C" fn(*const u8, usize, *mut usize) -> *mut u8;
pub type PluginFreeFn = unsafe extern "C" fn(*mut u8, usize);

pub const ENTRY_POINT_SYMBOL: &[u8] = b"deployd_plugin_run\0";
pub const FREE_SYMBOL: &[u8] = b"deployd_plugin_free\0";
