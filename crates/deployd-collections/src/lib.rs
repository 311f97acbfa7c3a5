//! The Collection Handler (spec.md §4.3): the four verbs uniform across
//! every collection, backed by the Schema Engine, a [`deployd_storage::Store`],
//! and the Event Pipeline.

pub mod handler;
pub mod hook_sources;
pub mod operator_update;
pub mod query_options;

pub use handler::CollectionService;
pub use hook_sources::HookSources;
