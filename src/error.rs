//! Error types for the coherence engine

use thiserror::Error;

/// Errors that can escape an engine operation.
///
/// Per-record ingestion problems never appear here: a malformed row is
/// skipped and counted inside the batch (see [`crate::normalizer::RejectReason`]).
/// These variants cover structural failures and boundary errors only.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to parse upload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Unsupported upload format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Message generation failed: {0}")]
    GenerationError(String),
}
