//! # scp-engine — Schema Engines
//!
//! The compiler pool treats the schema engine as a collaborator behind the
//! [`SchemaEngine`] trait: compile a document into a validate or serialize
//! callable, register auxiliary schemas, look up a compiled artifact by
//! `$id`, and emit standalone source for an artifact.
//!
//! Two engines ship with the crate:
//!
//! - [`draft::DraftEngine`]: JSON Schema draft-07, 2019-09 and 2020-12.
//!   Validation semantics are delegated to the `jsonschema` crate. This
//!   crate adds only the payload-shaping pass `jsonschema` does not have:
//!   type coercion, default filling, and removal of undeclared properties.
//! - [`jtd::JtdEngine`]: JSON Type Definition (RFC 8927) validation and
//!   compiled serialization.
//!
//! ## Standalone Bundles
//!
//! [`standalone`] encodes a compiled artifact as self-contained JSON source
//! and loads it back without the external schema map, plugins, or pool.
//!
//! ## Crate Policy
//!
//! - Engines are `Send + Sync`; compiled artifacts are shared via `Arc`.
//! - Engines are mutated only while being configured (`&mut self`);
//!   compilation takes `&self`.

pub mod artifact;
pub mod draft;
pub mod engine;
pub mod error;
pub mod extension;
pub mod jtd;
pub mod localize;
pub mod options;
pub mod registry;
pub mod standalone;

pub use artifact::{
    ArtifactKind, ArtifactSource, CompiledArtifact, ValidationFailure, ValidationIssue,
};
pub use engine::{create_engine, SchemaEngine};
pub use error::EngineError;
pub use extension::{FormatCheck, KeywordCheck, MessageLocalizer, ReferenceResolver};
pub use localize::{CatalogLocalizer, ErrorMessageLocalizer, PortableLocalizer};
pub use options::{CodeOptions, CoerceTypes, EngineMode, EngineOptions, RemoveAdditional, UseDefaults};
pub use registry::SchemaRegistry;
