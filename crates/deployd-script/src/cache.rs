//! Per-(collection, hook) parsed-script cache (spec.md §4.5 "Script
//! loading" and §5 "Shared resources": process-wide, reader-many /
//! writer-few, guarded by a read-write lock).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rhai::AST;

#[derive(Debug, Hash, PartialEq, Eq, Clone)]
pub struct ScriptKey {
    pub collection: String,
    pub hook: String,
}

impl ScriptKey {
    pub fn new(collection: impl Into<String>, hook: impl Into<String>) -> Self {
        ScriptKey {
            collection: collection.into(),
            hook: hook.into(),
        }
    }
}

#[derive(Default)]
pub struct ScriptCache {
    entries: RwLock<HashMap<ScriptKey, Arc<AST>>>,
}

impl ScriptCache {
    pub fn new() -> Self {
        ScriptCache::default()
    }

    pub fn get(&self, key: &ScriptKey) -> Option<Arc<AST>> {
        self.entries.read().get(key).cloned()
    }

    pub fn insert(&self, key: ScriptKey, ast: AST) -> Arc<AST> {
        let ast = Arc::new(ast);
        self.entries.write().insert(key, ast.clone());
        ast
    }

    pub fn invalidate(&self, key: &ScriptKey) {
        self.entries.write().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::compile;

    #[test]
    fn insert_then_get_round_trips() {
        let cache = ScriptCache::new();
        let key = ScriptKey::new("todos", "post");
        let ast = compile("data.title = \"x\";").unwrap();
        cache.insert(key.clone(), ast);
        assert!(cache.get(&key).is_some());
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache = ScriptCache::new();
        let key = ScriptKey::new("todos", "post");
        cache.insert(key.clone(), compile("1;").unwrap());
        cache.invalidate(&key);
        assert!(cache.get(&key).is_none());
    }
}
