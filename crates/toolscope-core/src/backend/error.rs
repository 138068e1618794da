//! Backend error types

use thiserror::Error;

/// Errors surfaced by model backends
#[derive(Debug, Error)]
pub enum BackendError {
    /// The remote API rejected or failed the request
    #[error("API error: {0}")]
    Api(String),

    /// The backend returned something we could not interpret
    #[error("Invalid response from backend: {0}")]
    InvalidResponse(String),

    /// A stream ended before producing a terminal chunk
    #[error("Stream ended unexpectedly")]
    StreamEnded,

    /// The backend does not implement native streaming
    #[error("Backend '{backend}' does not support streaming")]
    StreamingUnsupported { backend: String },

    /// Request or response serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Anything else
    #[error("{0}")]
    Other(String),
}

/// Convenience alias for backend results
pub type BackendResult<T> = Result<T, BackendError>;
