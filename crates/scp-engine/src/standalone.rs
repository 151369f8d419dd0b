//! # Standalone Bundles
//!
//! Source text for one compiled artifact that can be loaded without the
//! engine that produced it.
//!
//! A bundle is a JSON document:
//!
//! ```json
//! {
//!   "format": "scp-standalone/1",
//!   "kind": "validator",
//!   "mode": "standard",
//!   "options": { "coerceTypes": "array", "validateFormats": false, ... },
//!   "schema": { ... },
//!   "resources": { "urn:shared": { ... } },
//!   "formats": { "ticket": "^T-[0-9]+$" },
//!   "localizers": [ { "kind": "errorMessage" } ]
//! }
//! ```
//!
//! `options.validateFormats` records whether `format` was asserted when
//! the artifact was compiled. Regex formats and the built-in localizers
//! are data and travel in the bundle. Formats and keywords checked by code
//! cannot; engines holding one refuse to emit a bundle.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::artifact::{ArtifactKind, ArtifactSource, CompiledArtifact};
use crate::engine::create_engine;
use crate::error::EngineError;
use crate::localize::PortableLocalizer;
use crate::options::{CodeOptions, EngineMode, EngineOptions};
use crate::registry::{normalize_id, SchemaRegistry};

/// Format tag every bundle carries.
pub const BUNDLE_FORMAT: &str = "scp-standalone/1";

/// The decoded form of standalone source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandaloneBundle {
    pub format: String,
    pub kind: ArtifactKind,
    pub mode: EngineMode,
    pub options: EngineOptions,
    pub schema: Value,
    #[serde(default)]
    pub resources: BTreeMap<String, Value>,
    /// Regex formats by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub formats: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub localizers: Vec<PortableLocalizer>,
}

/// Engine extensions in the form a bundle carries them.
#[derive(Debug, Clone, Default)]
pub(crate) struct PortableExtensions {
    pub(crate) formats: BTreeMap<String, String>,
    pub(crate) localizers: Vec<PortableLocalizer>,
}

impl StandaloneBundle {
    /// Bundle an artifact with every other document registered alongside it.
    pub(crate) fn for_artifact(
        kind: ArtifactKind,
        source: &ArtifactSource,
        options: &EngineOptions,
        format_assertion: bool,
        registry: &SchemaRegistry,
        extensions: PortableExtensions,
    ) -> Self {
        let own_id = source
            .schema
            .get("$id")
            .and_then(Value::as_str)
            .map(normalize_id);
        let resources = registry
            .documents()
            .iter()
            .filter(|(id, _)| Some(id.as_str()) != own_id)
            .map(|(id, doc)| (id.clone(), doc.clone()))
            .collect();
        Self {
            format: BUNDLE_FORMAT.to_string(),
            kind,
            mode: source.mode,
            options: EngineOptions {
                validate_formats: format_assertion,
                code: CodeOptions { source: false },
                ..options.clone()
            },
            schema: source.schema.clone(),
            resources,
            formats: extensions.formats,
            localizers: extensions.localizers,
        }
    }

    pub fn to_source(&self) -> Result<String, EngineError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::InvalidStandalone(e.to_string()))
    }

    /// # Errors
    ///
    /// `InvalidStandalone` when the text is not a bundle of a known format.
    pub fn parse(source: &str) -> Result<Self, EngineError> {
        let bundle: Self = serde_json::from_str(source)
            .map_err(|e| EngineError::InvalidStandalone(e.to_string()))?;
        if bundle.format != BUNDLE_FORMAT {
            return Err(EngineError::InvalidStandalone(format!(
                "unsupported bundle format '{}'",
                bundle.format
            )));
        }
        Ok(bundle)
    }

    /// Recompile the bundled schema in a private engine.
    pub fn load(self) -> Result<CompiledArtifact, EngineError> {
        let assert_formats = self.options.validate_formats;
        let mut engine = create_engine(self.mode, self.options, None);
        if assert_formats {
            engine.enable_format_assertion();
        }
        for (name, pattern) in &self.formats {
            engine.add_pattern_format(name, pattern)?;
        }
        for localizer in self.localizers {
            engine.add_localizer(localizer.into_localizer());
        }
        for (id, document) in self.resources {
            engine.add_schema(&id, document)?;
        }
        match self.kind {
            ArtifactKind::Validator => engine.compile(&self.schema),
            ArtifactKind::Serializer => engine.compile_serializer(&self.schema),
        }
    }
}

/// Turn standalone source text back into an artifact.
pub fn load(source: &str) -> Result<CompiledArtifact, EngineError> {
    StandaloneBundle::parse(source)?.load()
}
