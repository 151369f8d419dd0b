//! # Engine Errors

use thiserror::Error;

/// Errors raised by schema engines.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine options or mode are not usable.
    #[error("engine configuration error: {0}")]
    Configuration(String),

    /// The schema document is malformed or references something that
    /// cannot be resolved.
    #[error("failed to compile schema {schema_id}: {reason}")]
    SchemaCompile {
        /// The schema `$id`, or `<anonymous>`.
        schema_id: String,
        /// Human-readable reason.
        reason: String,
    },

    /// A schema with this identifier is already known to the engine.
    #[error("schema with id '{0}' already exists")]
    DuplicateId(String),

    /// The capability is not available in this engine mode.
    #[error("{capability} is not supported in {mode} mode")]
    Unsupported {
        /// What was requested (`custom formats`, `custom keywords`, ...).
        capability: &'static str,
        /// The engine mode name.
        mode: String,
    },

    /// Standalone source was requested but `code.source` is off.
    #[error("source emission is disabled; set customOptions.code.source = true")]
    SourceEmissionDisabled,

    /// The artifact carries no source material to emit.
    #[error("artifact was compiled without source material")]
    MissingSource,

    /// An extension registered as code cannot be carried in standalone
    /// source; the restored artifact would check less than the live one.
    #[error("cannot emit standalone source: {0} is code, not data")]
    NotPortable(String),

    /// Standalone source text could not be loaded.
    #[error("invalid standalone source: {0}")]
    InvalidStandalone(String),
}

impl EngineError {
    pub(crate) fn compile(schema_id: Option<&str>, reason: impl Into<String>) -> Self {
        Self::SchemaCompile {
            schema_id: schema_id.unwrap_or("<anonymous>").to_string(),
            reason: reason.into(),
        }
    }
}
