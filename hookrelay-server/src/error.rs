//! HTTP-facing error type for the ingest path (§4.1, §7 kinds 1-2), grounded
//! on the teacher's `gateway_error.rs` `GatewayError`/`IntoResponse` split.
//!
//! Every other fallible path in this crate (config loading, signature
//! verification, external dispatch) returns its own `thiserror` enum and is
//! only ever logged, never turned into an HTTP response — only the ingest
//! handler needs this mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors the ingest handler (`POST <webhook-path>`) can produce, mapped to
/// the status codes named in §6/§7.
#[derive(Debug, Error)]
pub enum IngestError {
    /// §7 kind 1: HMAC mismatch. Maps to 403.
    #[error("signature verification failed")]
    SignatureMismatch,

    /// §4.1: missing signature or event-type header, or an unreadable body.
    /// Maps to 400.
    #[error("malformed webhook request: {0}")]
    Malformed(String),

    /// §7 kind 2: payload decode failure. Maps to 400.
    #[error("could not decode payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl IngestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            IngestError::SignatureMismatch => StatusCode::FORBIDDEN,
            IngestError::Malformed(_) => StatusCode::BAD_REQUEST,
            IngestError::Decode(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, self.to_string()).into_response()
    }
}
