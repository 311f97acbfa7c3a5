//! Database-neutral query/update builders and storage backends (spec.md
//! §4.7 "Storage Abstraction").

pub mod backends;
pub mod filter;
pub mod sanitize;
pub mod sql;
pub mod store;
pub mod update;

pub use filter::{CompareOp, Condition, Filter, FindOptions, UpdateOp, UpdateSpec};
pub use sanitize::sanitize_filter;
pub use store::{DeleteResult, Store, UpdateResult};
