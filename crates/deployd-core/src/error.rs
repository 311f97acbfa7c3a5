//! The error taxonomy threaded through every crate in the engine
//! (spec.md §7 "Error Handling Design").
//!
//! Mirrors the shape of `r2e_core::AppError`: a closed set of named
//! variants, each with a fixed HTTP status, plus a response shape. Unlike
//! `AppError` this type also knows how to carry a field-error map
//! (`validation-error`) and a hook-supplied status override (`cancel-error`).

use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Whether the engine is running in development mode — controls whether
/// internal fault messages are returned verbatim or masked (spec.md §7).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorDisclosure {
    pub dev_mode: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No document matched — spec.md §7 `not-found`.
    #[error("not found: {0}")]
    NotFound(String),

    /// One or more field errors — spec.md §7 `validation-error`.
    #[error("validation failed: {0:?}")]
    Validation(BTreeMap<String, String>),

    /// A hook invoked `cancel()` — spec.md §7 `cancel-error`.
    #[error("cancelled: {message}")]
    Cancel { message: String, status: u16 },

    /// Token invalid or expired, or a write required authentication —
    /// spec.md §7 `auth-error`.
    #[error("auth error: {0}")]
    Auth(AuthErrorKind),

    /// Authenticated but not authorized — spec.md §7 `forbidden`.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Backend-level failure — spec.md §7 `store-error`.
    #[error("store error: {0}")]
    Store(String),

    /// A compiled-plugin build or load failed — spec.md §7 `build-error`.
    #[error("build error: {0}")]
    Build(String),

    /// Type coercion failed irrecoverably — spec.md §7 `schema-mismatch`,
    /// "treated as validation-error".
    #[error("schema mismatch: {0:?}")]
    SchemaMismatch(BTreeMap<String, String>),

    /// Catch-all for unexpected internal faults (panics recovered at the
    /// per-hook boundary, I/O errors, etc).
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthErrorKind {
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("token expired")]
    TokenExpired,
    #[error("authentication required")]
    Required,
}

impl EngineError {
    pub fn status(&self) -> StatusCode {
        match self {
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Validation(_) | EngineError::SchemaMismatch(_) => StatusCode::BAD_REQUEST,
            EngineError::Cancel { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_REQUEST)
            }
            EngineError::Auth(_) => StatusCode::UNAUTHORIZED,
            EngineError::Forbidden(_) => StatusCode::FORBIDDEN,
            EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            EngineError::Build(_) => StatusCode::INTERNAL_SERVER_ERROR,
            EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Joined field-error message, for the `validation-error` response shape
    /// in spec.md §6.
    fn message(&self) -> String {
        match self {
            EngineError::NotFound(msg) => msg.clone(),
            EngineError::Validation(fields) | EngineError::SchemaMismatch(fields) => fields
                .iter()
                .map(|(field, msg)| format!("{field}: {msg}"))
                .collect::<Vec<_>>()
                .join(", "),
            EngineError::Cancel { message, .. } => message.clone(),
            EngineError::Auth(kind) => kind.to_string(),
            EngineError::Forbidden(msg) => msg.clone(),
            EngineError::Store(msg) => msg.clone(),
            EngineError::Build(msg) => msg.clone(),
            EngineError::Internal(msg) => msg.clone(),
        }
    }

    /// Internal faults are logged here; nothing else in the call chain
    /// should log the same error again.
    pub fn log(&self) {
        match self {
            EngineError::Store(_) | EngineError::Build(_) | EngineError::Internal(_) => {
                tracing::error!(error = %self, "engine error");
            }
            _ => tracing::debug!(error = %self, "engine error"),
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status();
        let body = match &self {
            EngineError::Validation(fields) | EngineError::SchemaMismatch(fields) => json!({
                "error": true,
                "message": self.message(),
                "status": status.as_u16(),
                "errors": fields,
            }),
            _ => json!({
                "error": true,
                "message": self.message(),
                "status": status.as_u16(),
            }),
        };
        (status, Json(body)).into_response()
    }
}

/// Generates `From<E> for EngineError` impls mapping a dependency error type
/// to a specific variant — the same macro shape as `r2e_core::map_error!`.
#[macro_export]
macro_rules! map_engine_error {
    ( $( $err_ty:ty => $variant:ident ),* $(,)? ) => {
        $(
            impl From<$err_ty> for $crate::error::EngineError {
                fn from(err: $err_ty) -> Self {
                    $crate::error::EngineError::$variant(err.to_string())
                }
            }
        )*
    };
}

map_engine_error! {
    std::io::Error => Internal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn parts(err: EngineError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn not_found_is_404() {
        let (status, body) = parts(EngineError::NotFound("todo".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], true);
    }

    #[tokio::test]
    async fn validation_carries_field_map() {
        let mut fields = BTreeMap::new();
        fields.insert("title".to_string(), "required".to_string());
        let (status, body) = parts(EngineError::Validation(fields)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"]["title"], "required");
    }

    #[tokio::test]
    async fn cancel_uses_attached_status() {
        let (status, _) = parts(EngineError::Cancel {
            message: "nope".into(),
            status: 403,
        })
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn cancel_defaults_status_parse_failure_to_400() {
        let (status, _) = parts(EngineError::Cancel {
            message: "nope".into(),
            status: 9999,
        })
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
