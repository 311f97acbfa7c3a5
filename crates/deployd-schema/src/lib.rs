//! Property schema, type coercion, and default materialization for
//! collections (spec.md §4.8).

pub mod collection;
pub mod engine;
pub mod property;

pub use collection::{CollectionConfig, HookKind, Runtime};
pub use engine::{apply_defaults, coerce, coerce_document, validate, FieldErrors};
pub use property::{Property, PropertyType, NOW_SENTINEL};
