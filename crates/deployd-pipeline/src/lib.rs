//! The seven-hook Event Pipeline (spec.md §4.4): dispatches each hook to
//! the script or compiled runtime, enforces the capability table, and
//! schedules AfterCommit off the request's critical path.

pub mod after_commit;
pub mod dispatch;
pub mod emit_sink;
pub mod hook_table;
pub mod list_scan;

pub use dispatch::{HookSpec, Pipeline};
pub use emit_sink::EmitSink;
pub use hook_table::{capabilities, fault_is_client_visible, HookCapabilities};
pub use list_scan::{list_get_outcome, skip_events_applies, ListGetOutcome};
