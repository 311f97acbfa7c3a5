//! Shared document model, identity, event context, and error taxonomy used
//! across every crate of the request lifecycle engine.

pub mod context;
pub mod error;
pub mod identity;
pub mod value;

pub use context::{Cancellation, EmitEntry, EventContext, LogEntry, Method};
pub use error::{AuthErrorKind, EngineError, ErrorDisclosure};
pub use identity::{Identity, TokenClaims};
pub use value::{Document, Value};
