//! The resolved hook source text for one collection, loaded once at
//! collection-load time (spec.md §4.4 "the pipeline maintains, for each
//! (collection, hook) pair, a handle to the resolved handler").

use std::collections::BTreeMap;

use deployd_schema::HookKind;

#[derive(Debug, Clone, Default)]
pub struct HookSources {
    sources: BTreeMap<HookKind, String>,
}

impl HookSources {
    pub fn new() -> Self {
        HookSources::default()
    }

    pub fn set(mut self, hook: HookKind, source: impl Into<String>) -> Self {
        self.sources.insert(hook, source.into());
        self
    }

    pub fn get(&self, hook: HookKind) -> Option<&str> {
        self.sources.get(&hook).map(String::as_str)
    }
}
