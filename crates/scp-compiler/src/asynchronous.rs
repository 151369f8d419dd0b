//! # Async Standalone Collaborators
//!
//! The same two modes as [`crate::standalone`], for stores and restores
//! that do I/O on an async runtime. Compilation itself stays synchronous;
//! only the collaborator call is awaited.

use std::sync::Arc;

use async_trait::async_trait;

use scp_core::{ExternalSchemaMap, RouteSchemaDescriptor};
use scp_engine::CompiledArtifact;

use crate::compiler::Compiler;
use crate::error::{BoxError, CompilerError};
use crate::options::CompilerOptions;
use crate::pool::CompilerPool;
use crate::standalone::{emit, with_source_emission};

#[async_trait]
pub trait AsyncSchemaStore: Send + Sync {
    async fn store(&self, descriptor: &RouteSchemaDescriptor, source: &str) -> Result<(), BoxError>;
}

#[async_trait]
pub trait AsyncSchemaRestore: Send + Sync {
    async fn restore(&self, descriptor: &RouteSchemaDescriptor) -> Result<CompiledArtifact, BoxError>;
}

#[derive(Clone)]
enum Mode {
    Write {
        pool: Arc<CompilerPool>,
        store: Arc<dyn AsyncSchemaStore>,
    },
    Read {
        restore: Arc<dyn AsyncSchemaRestore>,
    },
}

/// Async counterpart of [`crate::StandaloneCodeGenerator`].
#[derive(Clone)]
pub struct AsyncStandaloneCodeGenerator {
    mode: Mode,
}

impl AsyncStandaloneCodeGenerator {
    pub fn write_mode(pool: Arc<CompilerPool>, store: Arc<dyn AsyncSchemaStore>) -> Self {
        Self {
            mode: Mode::Write { pool, store },
        }
    }

    pub fn read_mode(restore: Arc<dyn AsyncSchemaRestore>) -> Self {
        Self {
            mode: Mode::Read { restore },
        }
    }

    pub fn is_read_mode(&self) -> bool {
        matches!(self.mode, Mode::Read { .. })
    }

    pub fn build_compiler(
        &self,
        external: &ExternalSchemaMap,
        options: &CompilerOptions,
    ) -> Result<AsyncStandaloneCompiler, CompilerError> {
        match &self.mode {
            Mode::Write { pool, store } => Ok(AsyncStandaloneCompiler::Write {
                compiler: pool.build_compiler(external, &with_source_emission(options))?,
                store: Arc::clone(store),
            }),
            Mode::Read { restore } => Ok(AsyncStandaloneCompiler::Read {
                restore: Arc::clone(restore),
            }),
        }
    }
}

#[derive(Clone)]
pub enum AsyncStandaloneCompiler {
    Write {
        compiler: Arc<Compiler>,
        store: Arc<dyn AsyncSchemaStore>,
    },
    Read {
        restore: Arc<dyn AsyncSchemaRestore>,
    },
}

impl AsyncStandaloneCompiler {
    /// See [`crate::StandaloneCompiler::compile_route`].
    pub async fn compile_route(
        &self,
        descriptor: &RouteSchemaDescriptor,
    ) -> Result<CompiledArtifact, CompilerError> {
        match self {
            Self::Write { compiler, store } => {
                let (artifact, source) = emit(compiler, descriptor)?;
                store
                    .store(descriptor, &source)
                    .await
                    .map_err(CompilerError::Store)?;
                Ok(artifact)
            }
            Self::Read { restore } => restore
                .restore(descriptor)
                .await
                .map_err(CompilerError::Restore),
        }
    }
}

impl std::fmt::Debug for AsyncStandaloneCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Write { compiler, .. } => f.debug_tuple("Write").field(compiler).finish(),
            Self::Read { .. } => f.write_str("Read"),
        }
    }
}
