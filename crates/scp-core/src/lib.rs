//! # scp-core — Foundational Types for the Schema Compiler Pool
//!
//! Leaf crate of the workspace. Defines the primitives every other crate
//! shares:
//!
//! 1. **`CanonicalBytes`.** All fingerprint computation flows through
//!    `CanonicalBytes::new()` (RFC 8785 / JCS). Two schema sets that differ
//!    only in key order produce the same bytes, so they share a compiler.
//!
//! 2. **`Fingerprint`.** A SHA-256 digest over canonical bytes, used as the
//!    compiler pool key.
//!
//! 3. **`RouteSchemaDescriptor`.** The immutable compile request produced by
//!    route registration: method, url, HTTP part, and the schema document.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `scp-*` crates.
//! - No `unsafe` code.
//! - No `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod route;

pub use canonical::CanonicalBytes;
pub use digest::Fingerprint;
pub use error::{CanonicalizationError, CoreError};
pub use route::{ExternalSchemaMap, HttpPart, RouteSchemaDescriptor};
