//! Error types for mesa.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MesaError {
    /// Caller input that cannot be acted on (missing table number, empty
    /// item list, non-positive quantity, malformed identifiers). Surfaced
    /// to the caller as a clarification message, never a hard failure.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A requested resource does not exist (unknown product id, audio
    /// asset, catalog miss on a direct lookup).
    #[error("Not found: {0}")]
    NotFound(String),

    /// A collaborator failed (database, media store, model provider,
    /// speech tooling). Logged and surfaced as a generic service error.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Model output that failed to parse during normalization. Always
    /// recovered locally; never reaches the caller.
    #[error("Malformed model output: {0}")]
    MalformedOutput(String),

    /// A bounded call (model dispatch, speech subprocess) ran out of time.
    #[error("Timed out after {0}s")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MesaError>;
