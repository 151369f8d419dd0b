//! # Directory Store
//!
//! Standalone sources live in one directory, one `<storage_key>.json` file
//! per route. `FileStore` writes them at build time, `FileRestore` loads
//! them at runtime.

use std::fs;
use std::path::{Path, PathBuf};

use scp_compiler::{BoxError, SchemaRestore, SchemaStore};
use scp_core::RouteSchemaDescriptor;
use scp_engine::{standalone, CompiledArtifact};

/// The file a route's standalone source is stored in.
pub fn source_path(dir: &Path, descriptor: &RouteSchemaDescriptor) -> PathBuf {
    dir.join(format!("{}.json", descriptor.storage_key()))
}

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SchemaStore for FileStore {
    fn store(&self, descriptor: &RouteSchemaDescriptor, source: &str) -> Result<(), BoxError> {
        fs::create_dir_all(&self.dir)?;
        let path = source_path(&self.dir, descriptor);
        fs::write(&path, source)?;
        tracing::info!(path = %path.display(), "stored standalone source");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FileRestore {
    dir: PathBuf,
}

impl FileRestore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SchemaRestore for FileRestore {
    fn restore(&self, descriptor: &RouteSchemaDescriptor) -> Result<CompiledArtifact, BoxError> {
        let path = source_path(&self.dir, descriptor);
        let source = fs::read_to_string(&path)
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        tracing::debug!(path = %path.display(), "restoring standalone source");
        Ok(standalone::load(&source)?)
    }
}
