//! Error types for the document generation service.
//!
//! This module defines the central `Error` enum, which captures every
//! reportable failure in the render path. It implements
//! [`IntoResponse`] so handlers can propagate errors with `?` and clients
//! always receive a structured body with a stable `kind` discriminator and a
//! human-readable message.
//!
//! ## Error Cases
//! - `TemplateNotFound`: The requested template id is unknown to the store.
//! - `PoolExhausted`: The pool is at capacity and admission rejected the
//!   request (or its queue is full).
//! - `AcquireTimeout`: The request queued for a rendering engine past its
//!   deadline.
//! - `RenderTimeout`: The document never reached quiescence, or the render
//!   exceeded its hard bound.
//! - `RenderEngineFault`: A rendering engine crashed or became unresponsive.
//! - `ExportFailure`: PDF export errored after the document loaded.
//! - `ServiceShutdown`: A request arrived while the service was shutting
//!   down.

use crate::server::pool::instance::EngineError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use minuta::TemplateId;
use serde_json::json;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the document generation service.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// The requested template does not exist in the store.
    #[error("template {id} not found")]
    TemplateNotFound { id: TemplateId },

    /// The render backend pool rejected the request at admission.
    #[error("render pool at capacity")]
    PoolExhausted,

    /// The request waited for a rendering engine past its deadline.
    #[error("timed out waiting for a rendering engine")]
    AcquireTimeout,

    /// The render exceeded a configured time bound.
    #[error("render timed out: {context}")]
    RenderTimeout { context: String },

    /// A rendering engine crashed or stopped responding.
    #[error("rendering engine fault: {context}")]
    RenderEngineFault { context: String },

    /// PDF export failed after the document loaded successfully.
    #[error("PDF export failed: {context}")]
    ExportFailure { context: String },

    /// The service is in the process of shutting down.
    #[error("service is shutting down")]
    ServiceShutdown,
}

impl Error {
    /// Stable discriminator for the client-facing failure body.
    ///
    /// These strings are part of the wire contract; callers branch on them.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TemplateNotFound { .. } => "template_not_found",
            Self::PoolExhausted => "pool_exhausted",
            Self::AcquireTimeout => "acquire_timeout",
            Self::RenderTimeout { .. } => "render_timeout",
            Self::RenderEngineFault { .. } => "render_engine_fault",
            Self::ExportFailure { .. } => "export_failure",
            Self::ServiceShutdown => "service_shutdown",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::TemplateNotFound { .. } => StatusCode::NOT_FOUND,
            Self::PoolExhausted => StatusCode::SERVICE_UNAVAILABLE,
            Self::AcquireTimeout => StatusCode::SERVICE_UNAVAILABLE,
            Self::RenderTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::RenderEngineFault { .. } => StatusCode::BAD_GATEWAY,
            Self::ExportFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceShutdown => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<EngineError> for Error {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Quiescence(bound) => Self::RenderTimeout {
                context: format!("document not quiescent within {bound:?}"),
            },
            EngineError::Launch(context) | EngineError::Unresponsive(context) => {
                Self::RenderEngineFault { context }
            }
            EngineError::Export(context) => Self::ExportFailure { context },
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "kind": self.kind(),
            "message": self.to_string(),
        }));
        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(Error::TemplateNotFound { id: 7 }.kind(), "template_not_found");
        assert_eq!(Error::PoolExhausted.kind(), "pool_exhausted");
        assert_eq!(Error::AcquireTimeout.kind(), "acquire_timeout");
        assert_eq!(Error::ServiceShutdown.kind(), "service_shutdown");
    }

    #[test]
    fn engine_errors_map_onto_the_taxonomy() {
        let err: Error = EngineError::Quiescence(core::time::Duration::from_secs(10)).into();
        assert_eq!(err.kind(), "render_timeout");

        let err: Error = EngineError::Unresponsive("ws closed".into()).into();
        assert_eq!(err.kind(), "render_engine_fault");

        let err: Error = EngineError::Export("printToPDF failed".into()).into();
        assert_eq!(err.kind(), "export_failure");
    }
}
