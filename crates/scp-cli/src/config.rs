//! # Project File
//!
//! `scp generate` reads a YAML (or JSON) project file describing the
//! compiler configuration, the shared schemas, and every route:
//!
//! ```yaml
//! mode: standard
//! customOptions:
//!   allErrors: true
//! plugins:
//!   - name: errorMessage
//!   - name: formats
//!     config:
//!       formats:
//!         ticket: "^T-[0-9]+$"
//! schemas:
//!   - schemas/user.json
//! routes:
//!   - method: POST
//!     url: /users
//!     httpPart: body
//!     schemaFile: schemas/create-user.yaml
//!   - method: GET
//!     url: /users/:id
//!     httpPart: params
//!     schema:
//!       type: object
//!       properties:
//!         id: { type: integer }
//! ```
//!
//! Relative paths are resolved against the project file's directory.
//!
//! Format regexes are not anchored. `T-[0-9]+` also accepts `xT-1y`; wrap
//! the pattern in `^...$` to match the whole value.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;

use scp_compiler::{
    CompilerConfig, CompilerOptions, EnginePlugin, ErrorMessagePlugin, FormatsPlugin,
    LocalizePlugin, PluginEntry,
};
use scp_core::{ExternalSchemaMap, HttpPart, RouteSchemaDescriptor};

/// The project file as written.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFile {
    #[serde(flatten)]
    pub compiler: CompilerConfig,
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,
    #[serde(default)]
    pub schemas: Vec<PathBuf>,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// A built-in plugin by name, with optional configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginConfig {
    pub name: String,
    #[serde(default)]
    pub config: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfig {
    pub method: String,
    pub url: String,
    pub http_part: HttpPart,
    #[serde(default)]
    pub http_status: Option<String>,
    #[serde(default)]
    pub schema: Option<Value>,
    #[serde(default)]
    pub schema_file: Option<PathBuf>,
}

/// A project with every file read and every route resolved.
#[derive(Debug)]
pub struct Project {
    pub options: CompilerOptions,
    pub external: ExternalSchemaMap,
    pub routes: Vec<RouteSchemaDescriptor>,
}

impl Project {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read project file {}", path.display()))?;
        let file: ProjectFile = serde_yaml::from_str(&text)
            .with_context(|| format!("failed to parse project file {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::resolve(file, base)
    }

    pub fn resolve(file: ProjectFile, base: &Path) -> Result<Self> {
        let mut options = CompilerOptions::from(file.compiler);
        for plugin in file.plugins {
            options.plugins.push(builtin_plugin(plugin)?);
        }

        let mut external = ExternalSchemaMap::new();
        for schema_path in &file.schemas {
            let path = resolve_path(schema_path, base);
            let document = read_document(&path)?;
            let key = match document.get("$id").and_then(Value::as_str) {
                Some(id) => id.to_string(),
                None => file_stem(&path)?,
            };
            if external.insert(key.clone(), document).is_some() {
                bail!("schema '{key}' is declared twice ({})", path.display());
            }
        }

        let mut routes = Vec::with_capacity(file.routes.len());
        for route in file.routes {
            let schema = match (route.schema, route.schema_file) {
                (Some(schema), None) => schema,
                (None, Some(schema_file)) => read_document(&resolve_path(&schema_file, base))?,
                _ => bail!(
                    "route {} {} ({}) needs exactly one of 'schema' or 'schemaFile'",
                    route.method,
                    route.url,
                    route.http_part
                ),
            };
            let mut descriptor =
                RouteSchemaDescriptor::new(route.method, route.url, route.http_part, schema);
            if let Some(status) = route.http_status {
                descriptor = descriptor.with_http_status(status);
            }
            routes.push(descriptor);
        }

        tracing::debug!(
            mode = %options.mode,
            schemas = external.len(),
            routes = routes.len(),
            "loaded project"
        );
        Ok(Self {
            options,
            external,
            routes,
        })
    }
}

fn builtin_plugin(plugin: PluginConfig) -> Result<PluginEntry> {
    let extension: Arc<dyn EnginePlugin> = match plugin.name.as_str() {
        "formats" => Arc::new(FormatsPlugin),
        "errorMessage" => Arc::new(ErrorMessagePlugin),
        "localize" => Arc::new(LocalizePlugin),
        other => bail!("unknown plugin '{other}' (expected formats, errorMessage or localize)"),
    };
    let entry = PluginEntry::new(extension);
    Ok(match plugin.config {
        Some(config) => entry.with_config(config),
        None => entry,
    })
}

/// Read a JSON or YAML schema document.
pub fn read_document(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

/// Absolute paths as is, relative ones against `base`.
pub fn resolve_path(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .with_context(|| format!("cannot derive a schema key from {}", path.display()))
}
