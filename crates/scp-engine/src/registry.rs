//! # Schema Registry
//!
//! Every engine owns one `SchemaRegistry` behind a `parking_lot::RwLock`.
//! It holds the raw documents registered with the engine (external schemas
//! plus every route schema that declared an `$id`) and the artifacts
//! compiled from them, keyed by `(kind, id)`.
//!
//! `RegistryRetriever` plugs the registry into `jsonschema` so `$ref`s to
//! registered documents resolve without network access.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use jsonschema::{Retrieve, Uri};
use serde_json::Value;

use crate::artifact::{ArtifactKind, CompiledArtifact};
use crate::error::EngineError;
use crate::extension::ReferenceResolver;

/// Base URI `jsonschema` resolves relative identifiers against.
const DEFAULT_BASE: &str = "json-schema:///";

/// Documents and compiled artifacts known to one engine.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    documents: BTreeMap<String, Value>,
    artifacts: HashMap<(ArtifactKind, String), CompiledArtifact>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `document` under its `$id`, or under `key` when it has none.
    ///
    /// Returns the identifier used.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::DuplicateId` if the identifier is taken.
    pub fn insert_document(&mut self, key: &str, document: Value) -> Result<String, EngineError> {
        let id = document
            .get("$id")
            .and_then(Value::as_str)
            .unwrap_or(key);
        let id = normalize_id(id).to_string();
        if self.documents.contains_key(&id) {
            return Err(EngineError::DuplicateId(id));
        }
        self.documents.insert(id.clone(), document);
        Ok(id)
    }

    /// Look a document up by identifier or `$ref` URI.
    pub fn document(&self, id: &str) -> Option<&Value> {
        self.documents.get(normalize_id(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.documents.contains_key(normalize_id(id))
    }

    pub fn documents(&self) -> &BTreeMap<String, Value> {
        &self.documents
    }

    pub fn artifact(&self, kind: ArtifactKind, id: &str) -> Option<CompiledArtifact> {
        self.artifacts.get(&(kind, normalize_id(id).to_string())).cloned()
    }

    /// Cache `artifact` unless one is already cached for `(kind, id)`.
    ///
    /// Returns whichever artifact ends up cached, so concurrent compiles of
    /// the same identifier agree on a single handle.
    pub fn insert_artifact(
        &mut self,
        kind: ArtifactKind,
        id: &str,
        artifact: CompiledArtifact,
    ) -> CompiledArtifact {
        self.artifacts
            .entry((kind, normalize_id(id).to_string()))
            .or_insert(artifact)
            .clone()
    }
}

/// Strip the default base URI and a trailing empty fragment.
pub(crate) fn normalize_id(id: &str) -> &str {
    let id = id.strip_prefix(DEFAULT_BASE).unwrap_or(id);
    id.strip_suffix('#').unwrap_or(id)
}

/// Resolves `$ref` URIs from registered documents, then the fallback
/// resolver. Never touches the network.
pub struct RegistryRetriever {
    documents: BTreeMap<String, Value>,
    resolver: Option<Arc<dyn ReferenceResolver>>,
}

impl RegistryRetriever {
    /// A retriever over a snapshot of registered documents.
    pub fn new(
        documents: BTreeMap<String, Value>,
        resolver: Option<Arc<dyn ReferenceResolver>>,
    ) -> Self {
        Self { documents, resolver }
    }
}

impl Retrieve for RegistryRetriever {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let uri_str = uri.as_str();
        let id = normalize_id(uri_str);

        if let Some(value) = self.documents.get(id) {
            return Ok(value.clone());
        }

        if let Some(resolver) = &self.resolver {
            if let Some(value) = resolver.resolve(id) {
                return Ok(value);
            }
            if id != uri_str {
                if let Some(value) = resolver.resolve(uri_str) {
                    return Ok(value);
                }
            }
        }

        Err(format!("schema not found for $ref '{uri_str}'").into())
    }
}
