//! # Error Types
//!
//! Errors shared by every crate in the workspace. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.

use thiserror::Error;

/// Top-level error type for `scp-core`.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Canonicalization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// A route descriptor could not be parsed.
    #[error("invalid route descriptor: {0}")]
    InvalidRoute(String),
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// The JCS writer produced bytes that are not UTF-8.
    #[error("canonical output is not valid UTF-8")]
    InvalidUtf8,
}
