//! The compiled-plugin manager (spec.md §4.6): builds, loads, caches, and
//! invokes plugins; records loader-level faults; guards each
//! (collection, hook) pair with a build lock so concurrent requests for an
//! unbuilt fingerprint never compile it twice (spec.md §5 "Suspension
//! points").

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use libloading::Library;
use tokio::sync::Mutex as AsyncMutex;

use deployd_core::EngineError;

use crate::builder::Builder;
use crate::envelope::{PluginEntryPoint, PluginFreeFn, PluginRequest, PluginResponse, ENTRY_POINT_SYMBOL, FREE_SYMBOL};
use crate::fingerprint::fingerprint;

#[derive(Debug, Hash, PartialEq, Eq, Clone)]
pub struct PluginKey {
    pub collection: String,
    pub hook: String,
}

impl PluginKey {
    pub fn new(collection: impl Into<String>, hook: impl Into<String>) -> Self {
        PluginKey {
            collection: collection.into(),
            hook: hook.into(),
        }
    }
}

struct LoadedPlugin {
    fingerprint: String,
    // Kept alive for as long as `entry`/`free` may be called; the function
    // pointers borrow from this library's mapped memory.
    _library: Arc<Library>,
    entry: PluginEntryPoint,
    free: PluginFreeFn,
}

pub struct PluginManager {
    builder: Builder,
    loaded: DashMap<PluginKey, LoadedPlugin>,
    build_locks: DashMap<PluginKey, Arc<AsyncMutex<()>>>,
    faults: DashMap<PluginKey, String>,
}

impl PluginManager {
    pub fn new(cache_dir: impl Into<PathBuf>, deployd_plugin_path: impl Into<PathBuf>) -> Self {
        PluginManager {
            builder: Builder::new(cache_dir, deployd_plugin_path),
            loaded: DashMap::new(),
            build_locks: DashMap::new(),
            faults: DashMap::new(),
        }
    }

    pub fn fault_for(&self, key: &PluginKey) -> Option<String> {
        self.faults.get(key).map(|f| f.clone())
    }

    /// Ensures a loaded plugin exists for `key`/`source`'s current
    /// fingerprint, building and loading it if necessary (spec.md §4.6
    /// "Invalidation": a changed source triggers a rebuild lazily, on next
    /// use).
    async fn ensure_loaded(&self, key: &PluginKey, source: &str) -> Result<(), EngineError> {
        let fp = fingerprint(source);
        if let Some(entry) = self.loaded.get(key) {
            if entry.fingerprint == fp {
                return Ok(());
            }
        }

        let lock = self
            .build_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Re-check after acquiring the lock: another request may have
        // already built this exact fingerprint while we waited.
        if let Some(entry) = self.loaded.get(key) {
            if entry.fingerprint == fp {
                return Ok(());
            }
        }

        let build_result = self.builder.build(&key.collection, &key.hook, source).await;
        let artifact = match build_result {
            Ok(path) => path,
            Err(err) => {
                self.faults.insert(key.clone(), err.to_string());
                return Err(err);
            }
        };

        let loaded = unsafe { load_plugin(&artifact, fp) }?;
        self.loaded.insert(key.clone(), loaded);
        self.faults.remove(key);
        Ok(())
    }

    /// Builds/loads as needed, then invokes the plugin's entry point with
    /// `request` and decodes its response.
    pub async fn invoke(
        &self,
        key: &PluginKey,
        source: &str,
        request: &PluginRequest,
    ) -> Result<PluginResponse, EngineError> {
        self.ensure_loaded(key, source).await?;

        let entry_ref = self
            .loaded
            .get(key)
            .ok_or_else(|| EngineError::Internal("plugin vanished from cache after load".to_string()))?;

        let input = serde_json::to_vec(request).map_err(|e| EngineError::Internal(e.to_string()))?;
        let (entry, free) = (entry_ref.entry, entry_ref.free);
        drop(entry_ref);

        unsafe { invoke_entry(entry, free, &input) }
    }
}

unsafe fn load_plugin(artifact: &std::path::Path, fp: String) -> Result<LoadedPlugin, EngineError> {
    let library = Library::new(artifact).map_err(|e| EngineError::Build(format!("failed to load plugin: {e}")))?;
    let entry: PluginEntryPoint = *library
        .get::<PluginEntryPoint>(ENTRY_POINT_SYMBOL)
        .map_err(|e| EngineError::Build(format!("missing entry symbol: {e}")))?;
    let free: PluginFreeFn = *library
        .get::<PluginFreeFn>(FREE_SYMBOL)
        .map_err(|e| EngineError::Build(format!("missing free symbol: {e}")))?;
    Ok(LoadedPlugin {
        fingerprint: fp,
        _library: Arc::new(library),
        entry,
        free,
    })
}

unsafe fn invoke_entry(
    entry: PluginEntryPoint,
    free: PluginFreeFn,
    input: &[u8],
) -> Result<PluginResponse, EngineError> {
    let mut out_len: usize = 0;
    let out_ptr = entry(input.as_ptr(), input.len(), &mut out_len as *mut usize);
    if out_ptr.is_null() {
        return Err(EngineError::Internal("plugin returned a null response".to_string()));
    }
    let bytes = std::slice::from_raw_parts(out_ptr, out_len);
    let response: Result<PluginResponse, EngineError> = serde_json::from_slice(bytes)
        .map_err(|e| EngineError::Internal(format!("malformed plugin response: {e}")));
    free(out_ptr, out_len);
    response
}
