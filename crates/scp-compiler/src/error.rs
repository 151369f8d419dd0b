//! # Compiler Errors

use scp_core::{CanonicalizationError, HttpPart};
use scp_engine::EngineError;
use thiserror::Error;

/// Error type collaborators (store, restore) report through.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while building compilers or compiling routes.
#[derive(Error, Debug)]
pub enum CompilerError {
    /// Missing collaborator, unknown mode, or unusable options. Raised at
    /// construction, never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A route schema could not be compiled. Registration of the route
    /// must be treated as failed.
    #[error("failed to compile {http_part} schema for {method} {url}: {reason}")]
    SchemaCompile {
        method: String,
        url: String,
        http_part: HttpPart,
        reason: String,
    },

    /// A plugin rejected the engine or its configuration.
    #[error("plugin '{name}' failed: {reason}")]
    Plugin { name: String, reason: String },

    /// The store collaborator failed. The original error is the source.
    #[error("store collaborator failed: {0}")]
    Store(#[source] BoxError),

    /// The restore collaborator failed. The original error is the source.
    #[error("restore collaborator failed: {0}")]
    Restore(#[source] BoxError),

    /// The configuration could not be canonicalized for fingerprinting.
    #[error("failed to fingerprint compiler configuration: {0}")]
    Fingerprint(#[from] CanonicalizationError),

    /// An engine error outside route compilation.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl CompilerError {
    /// Map an engine error into a configuration error when it is one.
    pub(crate) fn from_engine_setup(err: EngineError) -> Self {
        match err {
            EngineError::Configuration(reason) => Self::Configuration(reason),
            other => Self::Engine(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_keeps_source() {
        let original: BoxError = "disk full".into();
        let err = CompilerError::Store(original);
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "disk full");
        assert_eq!(err.to_string(), "store collaborator failed: disk full");
    }

    #[test]
    fn test_schema_compile_display() {
        let err = CompilerError::SchemaCompile {
            method: "POST".into(),
            url: "/foo".into(),
            http_part: HttpPart::Body,
            reason: "bad".into(),
        };
        assert_eq!(err.to_string(), "failed to compile body schema for POST /foo: bad");
    }

    #[test]
    fn test_engine_configuration_maps_to_configuration() {
        let err = CompilerError::from_engine_setup(EngineError::Configuration("x".into()));
        assert!(matches!(err, CompilerError::Configuration(_)));
    }
}
