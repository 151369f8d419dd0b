//! # The Schema Engine Seam
//!
//! `SchemaEngine` is the capability set the compiler needs from a schema
//! engine. `create_engine` picks the implementation from the mode.

use std::sync::Arc;

use serde_json::Value;

use crate::artifact::{ArtifactKind, CompiledArtifact};
use crate::draft::DraftEngine;
use crate::error::EngineError;
use crate::extension::{FormatCheck, KeywordCheck, MessageLocalizer, ReferenceResolver};
use crate::jtd::JtdEngine;
use crate::options::{EngineMode, EngineOptions};

/// A schema engine: compiles schema documents into artifacts.
///
/// Configuration methods take `&mut self` and run while the owning compiler
/// is being built. Compilation takes `&self`; engines cache compiled
/// artifacts internally behind a lock.
pub trait SchemaEngine: Send + Sync {
    fn mode(&self) -> EngineMode;

    fn options(&self) -> &EngineOptions;

    /// Register a document other schemas may reference.
    ///
    /// # Errors
    ///
    /// `DuplicateId` if the identifier is taken, `SchemaCompile` if the
    /// document is not a schema for this mode.
    fn add_schema(&mut self, key: &str, schema: Value) -> Result<(), EngineError>;

    /// Whether a document with this identifier is registered.
    fn has_schema(&self, id: &str) -> bool;

    /// The artifact for a registered identifier, compiling it on first use.
    ///
    /// `Ok(None)` when the identifier is unknown.
    fn get_schema(&self, id: &str, kind: ArtifactKind)
        -> Result<Option<CompiledArtifact>, EngineError>;

    /// Compile a validator. A schema with an `$id` is registered as well.
    ///
    /// # Errors
    ///
    /// `DuplicateId` if the schema's `$id` is already registered.
    fn compile(&self, schema: &Value) -> Result<CompiledArtifact, EngineError>;

    /// Compile a serializer.
    fn compile_serializer(&self, schema: &Value) -> Result<CompiledArtifact, EngineError>;

    /// Register a format checked by code. Standalone source cannot carry
    /// it; see [`SchemaEngine::add_pattern_format`].
    fn add_format(&mut self, name: &str, check: FormatCheck) -> Result<(), EngineError>;

    /// Register a format that matches `pattern`, an unanchored regex.
    /// Unlike [`SchemaEngine::add_format`] the pattern travels with
    /// standalone source.
    ///
    /// # Errors
    ///
    /// `Configuration` when the pattern is not a valid regex.
    fn add_pattern_format(&mut self, name: &str, pattern: &str) -> Result<(), EngineError>;

    /// Turn on `format` assertion (subject to `validateFormats`).
    fn enable_format_assertion(&mut self);

    fn format_assertion(&self) -> bool;

    fn add_keyword(&mut self, name: &str, check: Arc<dyn KeywordCheck>) -> Result<(), EngineError>;

    fn add_localizer(&mut self, localizer: Arc<dyn MessageLocalizer>);

    /// Dependency-free source text for an artifact this engine compiled.
    ///
    /// # Errors
    ///
    /// `SourceEmissionDisabled` unless `code.source` is on. `NotPortable`
    /// when a code format, keyword or localizer is registered, since the
    /// restored artifact would not enforce it.
    fn standalone_source(&self, artifact: &CompiledArtifact) -> Result<String, EngineError>;
}

/// Construct the engine for `mode`.
pub fn create_engine(
    mode: EngineMode,
    options: EngineOptions,
    resolver: Option<Arc<dyn ReferenceResolver>>,
) -> Box<dyn SchemaEngine> {
    match mode {
        EngineMode::Jtd => Box::new(JtdEngine::new(options)),
        draft => Box::new(DraftEngine::new(draft, options, resolver)),
    }
}
