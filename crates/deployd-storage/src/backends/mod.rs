//! The three storage backends of spec.md §4.7: embedded SQL, networked SQL,
//! and document store.

pub mod mongo;
pub mod postgres;
pub mod sqlite;

pub use mongo::MongoStore;
pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;
