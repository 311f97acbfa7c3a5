//! The declaration of a resource (spec.md §3 "CollectionConfig").

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::property::Property;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    Script,
    Compiled,
}

/// The seven hook points, in the order the Event Pipeline executes them
/// (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HookKind {
    BeforeRequest,
    Validate,
    Get,
    Post,
    Put,
    Delete,
    AfterCommit,
}

impl HookKind {
    pub fn file_name(self) -> &'static str {
        match self {
            HookKind::BeforeRequest => "beforerequest",
            HookKind::Validate => "validate",
            HookKind::Get => "get",
            HookKind::Post => "post",
            HookKind::Put => "put",
            HookKind::Delete => "delete",
            HookKind::AfterCommit => "aftercommit",
        }
    }

    pub const ALL: [HookKind; 7] = [
        HookKind::BeforeRequest,
        HookKind::Validate,
        HookKind::Get,
        HookKind::Post,
        HookKind::Put,
        HookKind::Delete,
        HookKind::AfterCommit,
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub name: String,
    pub properties: BTreeMap<String, Property>,
    #[serde(default, rename = "noStore")]
    pub no_store: bool,
    #[serde(default)]
    pub runtimes: BTreeMap<HookKind, Runtime>,
}

impl CollectionConfig {
    pub fn new(name: impl Into<String>) -> Self {
        CollectionConfig {
            name: name.into(),
            properties: BTreeMap::new(),
            no_store: false,
            runtimes: BTreeMap::new(),
        }
    }

    /// A collection may not declare a property whose name begins with `$`
    /// (reserved for filter/update operators, spec.md §9).
    pub fn validate_declaration(&self) -> Result<(), String> {
        for name in self.properties.keys() {
            if name.starts_with('$') {
                return Err(format!(
                    "collection {:?}: property {name:?} may not begin with '$'",
                    self.name
                ));
            }
        }
        Ok(())
    }

    pub fn add_property(mut self, property: Property) -> Self {
        self.properties.insert(property.name.clone(), property);
        self
    }

    pub fn runtime_for(&self, hook: HookKind) -> Runtime {
        self.runtimes.get(&hook).copied().unwrap_or(Runtime::Script)
    }
}
