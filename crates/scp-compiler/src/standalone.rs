//! # Standalone Code Generation
//!
//! Ahead-of-time compilation in two modes.
//!
//! **Write mode** (build time): compilers come from a pool with source
//! emission forced on. Every compiled route is also rendered as standalone
//! source and handed to a [`SchemaStore`] exactly once.
//!
//! **Read mode** (runtime): no pool, engine, plugin or external schema is
//! involved. Every compile request is answered by a [`SchemaRestore`],
//! typically by loading what write mode stored with
//! [`scp_engine::standalone::load`].

use std::fmt;
use std::sync::Arc;

use serde_json::{json, Value};

use scp_core::{ExternalSchemaMap, RouteSchemaDescriptor};
use scp_engine::CompiledArtifact;

use crate::compiler::Compiler;
use crate::error::{BoxError, CompilerError};
use crate::options::CompilerOptions;
use crate::pool::CompilerPool;

/// Persists the standalone source of one route.
pub trait SchemaStore: Send + Sync {
    fn store(&self, descriptor: &RouteSchemaDescriptor, source: &str) -> Result<(), BoxError>;
}

impl<F> SchemaStore for F
where
    F: Fn(&RouteSchemaDescriptor, &str) -> Result<(), BoxError> + Send + Sync,
{
    fn store(&self, descriptor: &RouteSchemaDescriptor, source: &str) -> Result<(), BoxError> {
        self(descriptor, source)
    }
}

/// Produces the artifact of one route without compiling anything.
pub trait SchemaRestore: Send + Sync {
    fn restore(&self, descriptor: &RouteSchemaDescriptor) -> Result<CompiledArtifact, BoxError>;
}

impl<F> SchemaRestore for F
where
    F: Fn(&RouteSchemaDescriptor) -> Result<CompiledArtifact, BoxError> + Send + Sync,
{
    fn restore(&self, descriptor: &RouteSchemaDescriptor) -> Result<CompiledArtifact, BoxError> {
        self(descriptor)
    }
}

/// Options-driven construction, for hosts that pick the mode at runtime.
#[derive(Clone, Default)]
pub struct StandaloneOptions {
    pub read_mode: bool,
    pub store: Option<Arc<dyn SchemaStore>>,
    pub restore: Option<Arc<dyn SchemaRestore>>,
}

impl fmt::Debug for StandaloneOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandaloneOptions")
            .field("read_mode", &self.read_mode)
            .field("store", &self.store.is_some())
            .field("restore", &self.restore.is_some())
            .finish()
    }
}

#[derive(Clone)]
enum Mode {
    Write {
        pool: Arc<CompilerPool>,
        store: Arc<dyn SchemaStore>,
    },
    Read {
        restore: Arc<dyn SchemaRestore>,
    },
}

/// Builds [`StandaloneCompiler`]s for one mode.
#[derive(Clone)]
pub struct StandaloneCodeGenerator {
    mode: Mode,
}

impl StandaloneCodeGenerator {
    pub fn write_mode(pool: Arc<CompilerPool>, store: Arc<dyn SchemaStore>) -> Self {
        Self {
            mode: Mode::Write { pool, store },
        }
    }

    pub fn read_mode(restore: Arc<dyn SchemaRestore>) -> Self {
        Self {
            mode: Mode::Read { restore },
        }
    }

    /// # Errors
    ///
    /// `Configuration` when the collaborator the mode needs is missing.
    pub fn new(options: StandaloneOptions, pool: Arc<CompilerPool>) -> Result<Self, CompilerError> {
        if options.read_mode {
            let restore = options.restore.ok_or_else(|| {
                CompilerError::Configuration("read mode requires a restore collaborator".into())
            })?;
            Ok(Self::read_mode(restore))
        } else {
            let store = options.store.ok_or_else(|| {
                CompilerError::Configuration("write mode requires a store collaborator".into())
            })?;
            Ok(Self::write_mode(pool, store))
        }
    }

    pub fn is_read_mode(&self) -> bool {
        matches!(self.mode, Mode::Read { .. })
    }

    /// A compiler for this configuration.
    ///
    /// In read mode the arguments are ignored and nothing is built.
    pub fn build_compiler(
        &self,
        external: &ExternalSchemaMap,
        options: &CompilerOptions,
    ) -> Result<StandaloneCompiler, CompilerError> {
        match &self.mode {
            Mode::Write { pool, store } => {
                let compiler = pool.build_compiler(external, &with_source_emission(options))?;
                Ok(StandaloneCompiler::Write {
                    compiler,
                    store: Arc::clone(store),
                })
            }
            Mode::Read { restore } => Ok(StandaloneCompiler::Read {
                restore: Arc::clone(restore),
            }),
        }
    }
}

impl fmt::Debug for StandaloneCodeGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = if self.is_read_mode() { "read" } else { "write" };
        f.debug_struct("StandaloneCodeGenerator").field("mode", &mode).finish()
    }
}

/// The per-configuration compile function of a standalone generator.
#[derive(Clone)]
pub enum StandaloneCompiler {
    Write {
        compiler: Arc<Compiler>,
        store: Arc<dyn SchemaStore>,
    },
    Read {
        restore: Arc<dyn SchemaRestore>,
    },
}

impl StandaloneCompiler {
    /// Compile (write mode) or restore (read mode) one route.
    ///
    /// # Errors
    ///
    /// Write mode: compile errors as for [`Compiler::compile_route`], and
    /// `Store` when the store fails. Read mode: `Restore`.
    pub fn compile_route(
        &self,
        descriptor: &RouteSchemaDescriptor,
    ) -> Result<CompiledArtifact, CompilerError> {
        match self {
            Self::Write { compiler, store } => {
                let (artifact, source) = emit(compiler, descriptor)?;
                store
                    .store(descriptor, &source)
                    .map_err(CompilerError::Store)?;
                Ok(artifact)
            }
            Self::Read { restore } => restore.restore(descriptor).map_err(CompilerError::Restore),
        }
    }
}

impl fmt::Debug for StandaloneCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write { compiler, .. } => f.debug_tuple("Write").field(compiler).finish(),
            Self::Read { .. } => f.write_str("Read"),
        }
    }
}

/// Compile a route and render its standalone source.
pub(crate) fn emit(
    compiler: &Compiler,
    descriptor: &RouteSchemaDescriptor,
) -> Result<(CompiledArtifact, String), CompilerError> {
    let artifact = compiler.compile_route(descriptor)?;
    let source = compiler.standalone_source(&artifact)?;
    tracing::debug!(
        method = %descriptor.method,
        url = %descriptor.url,
        part = %descriptor.http_part,
        bytes = source.len(),
        "emitted standalone source"
    );
    Ok((artifact, source))
}

/// `options` with `code.source` forced on. Other `code` keys are kept.
pub(crate) fn with_source_emission(options: &CompilerOptions) -> CompilerOptions {
    let mut options = options.clone();
    let code = options
        .custom_options
        .entry("code")
        .or_insert_with(|| json!({}));
    match code {
        Value::Object(map) => {
            map.insert("source".into(), Value::Bool(true));
        }
        other => *other = json!({"source": true}),
    }
    options
}
