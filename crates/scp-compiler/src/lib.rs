//! # scp-compiler — The Schema Compiler Pool
//!
//! Turns route schema descriptors into validate and serialize callables,
//! building at most one configured engine per distinct configuration.
//!
//! ## Flow
//!
//! ```text
//! route registration
//!   └─ CompilerPool::build_compiler(external, options)   one per fingerprint
//!        └─ Compiler::compile_route(descriptor)          one per route
//!             └─ CompiledArtifact                        validate / serialize
//! ```
//!
//! [`StandaloneCodeGenerator`] wraps the same flow for ahead-of-time use:
//! write mode stores standalone source for every route at build time, read
//! mode restores it at runtime without building anything.
//!
//! ## Crate Policy
//!
//! - The pool is an explicit value owned by the host. There is no global.
//! - Plugins run exactly once per engine, during compiler construction.
//! - Compilers, pools and artifacts are `Send + Sync`.

pub mod asynchronous;
pub mod compiler;
pub mod error;
pub mod options;
pub mod plugin;
pub mod pool;
pub mod standalone;

pub use asynchronous::{
    AsyncSchemaRestore, AsyncSchemaStore, AsyncStandaloneCodeGenerator, AsyncStandaloneCompiler,
};
pub use compiler::Compiler;
pub use error::{BoxError, CompilerError};
pub use options::{CompilerConfig, CompilerOptions, OnCreateHook};
pub use plugin::{
    EnginePlugin, ErrorMessagePlugin, FormatsPlugin, LocalizePlugin, PluginAdapter, PluginEntry,
    PluginReport, FORMATS_PLUGIN,
};
pub use pool::CompilerPool;
pub use standalone::{
    SchemaRestore, SchemaStore, StandaloneCodeGenerator, StandaloneCompiler, StandaloneOptions,
};
