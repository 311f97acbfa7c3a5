//! Loads the persisted per-collection directory layout of spec.md §6
//! ("Persisted state layout"): `config.json` holds the schema and
//! hook-runtime selection; one file per hook holds that hook's source for
//! the runtime `config.json` selected; a `.plugins` subdirectory (owned by
//! `deployd_plugin::PluginManager`, never read directly here) holds
//! compiled artifacts keyed by fingerprint.

use std::path::{Path, PathBuf};

use deployd_collections::HookSources;
use deployd_schema::{CollectionConfig, HookKind, Runtime};

#[derive(Debug)]
pub enum PersistedError {
    Io(std::io::Error),
    MalformedConfig(String),
}

impl std::fmt::Display for PersistedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistedError::Io(err) => write!(f, "i/o error: {err}"),
            PersistedError::MalformedConfig(msg) => write!(f, "malformed collection config: {msg}"),
        }
    }
}

impl std::error::Error for PersistedError {}

impl From<std::io::Error> for PersistedError {
    fn from(err: std::io::Error) -> Self {
        PersistedError::Io(err)
    }
}

/// One resolved collection: its declared schema plus the source text for
/// each hook `config.json` selected a runtime for.
pub struct LoadedCollection {
    pub config: CollectionConfig,
    pub hook_sources: HookSources,
}

/// A hook whose declared runtime is [`Runtime::Compiled`] has no source
/// file loaded here — `deployd_plugin::PluginManager` builds and caches it
/// lazily from the author's crate under the collection directory instead.
fn hook_file_path(dir: &Path, hook: HookKind) -> PathBuf {
    dir.join(format!("{}.txt", hook.file_name()))
}

pub fn load_collection(dir: &Path) -> Result<LoadedCollection, PersistedError> {
    let config_path = dir.join("config.json");
    let content = std::fs::read_to_string(&config_path)?;
    let config: CollectionConfig = serde_json::from_str(&content)
        .map_err(|e| PersistedError::MalformedConfig(e.to_string()))?;
    config
        .validate_declaration()
        .map_err(PersistedError::MalformedConfig)?;

    let mut hook_sources = HookSources::new();
    for hook in HookKind::ALL {
        if config.runtime_for(hook) != Runtime::Script {
            continue;
        }
        let path = hook_file_path(dir, hook);
        if path.exists() {
            let source = std::fs::read_to_string(&path)?;
            hook_sources = hook_sources.set(hook, source);
        }
    }

    Ok(LoadedCollection { config, hook_sources })
}

/// Scans `resources_dir` for one subdirectory per collection (each holding
/// its own `config.json`), skipping anything that doesn't look like a
/// collection directory rather than failing the whole server startup over
/// one malformed entry.
pub fn load_all_collections(resources_dir: &Path) -> Result<Vec<LoadedCollection>, PersistedError> {
    if !resources_dir.exists() {
        return Ok(Vec::new());
    }
    let mut collections = Vec::new();
    for entry in std::fs::read_dir(resources_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() || !path.join("config.json").exists() {
            continue;
        }
        match load_collection(&path) {
            Ok(loaded) => collections.push(loaded),
            Err(err) => tracing::warn!(path = %path.display(), %err, "skipping unreadable collection directory"),
        }
    }
    Ok(collections)
}

pub fn plugin_cache_dir(resources_dir: &Path, collection: &str) -> PathBuf {
    resources_dir.join(collection).join(".plugins")
}
