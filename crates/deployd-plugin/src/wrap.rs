//! Wraps a hook author's `Run(ctx)` source into a compilable cdylib crate
//! (spec.md §4.6, build pipeline step 3).

use crate::envelope::{FREE_SYMBOL, ENTRY_POINT_SYMBOL};

/// The manifest pinning the plugin's one dependency: the envelope types
/// shared with the host, vendored as a path dependency onto the same
/// workspace checkout so the plugin and host agree on the wire format
/// without agreeing on ABI.
pub fn wrapped_manifest(package_name: &str, deployd_plugin_path: &str) -> String {
    format!(
        r#"[package]
name = "{package_name}"
version = "0.0.0"
edition = "2021"
publish = false

[lib]
crate-type = ["cdylib"]

[dependencies]
deployd-plugin = {{ path = "{deployd_plugin_path}" }}
serde_json = "1"
"#
    )
}

/// Prepends the package scaffolding and emits the `extern "C"` entry point
/// around the author's `Run(ctx)` function (spec.md §4.6: "prepending a
/// package declaration, importing the EventContext type, and emitting a
/// handler symbol").
pub fn wrap_source(author_source: &str) -> String {
    let entry_symbol = String::from_utf8_lossy(&ENTRY_POINT_SYMBOL[..ENTRY_POINT_SYMBOL.len() - 1]).into_owned();
    let free_symbol = String::from_utf8_lossy(&FREE_SYMBOL[..FREE_SYMBOL.len() - 1]).into_owned();

    format!(
        r#"// Generated wrapper. Do not edit by hand; regenerated on every build
// from the collection's hook source.
use deployd_plugin::bridge::{{HookContext, respond}};

{author_source}

#[no_mangle]
pub unsafe extern "C" fn {entry_symbol}(
    input_ptr: *const u8,
    input_len: usize,
    out_len: *mut usize,
) -> *mut u8 {{
    let bytes = std::slice::from_raw_parts(input_ptr, input_len);
    let mut ctx = match HookContext::from_envelope_bytes(bytes) {{
        Ok(ctx) => ctx,
        Err(err) => return respond(out_len, &HookContext::fault_response(&err)),
    }};

    Run(&mut ctx);

    respond(out_len, &ctx.into_response())
}}

#[no_mangle]
pub unsafe extern "C" fn {free_symbol}(ptr: *mut u8, len: usize) {{
    drop(Vec::from_raw_parts(ptr, len, len));
}}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_source_emits_both_symbols() {
        let wrapped = wrap_source("fn Run(ctx: &mut HookContext) {}");
        assert!(wrapped.contains("deployd_plugin_run"));
        assert!(wrapped.contains("deployd_plugin_free"));
        assert!(wrapped.contains("fn Run"));
    }

    #[test]
    fn manifest_declares_a_cdylib() {
        let manifest = wrapped_manifest("hook_todos_post_a1b2", "../../deployd-plugin");
        assert!(manifest.contains("cdylib"));
    }
}
