//! # Draft Engine
//!
//! JSON Schema draft-07, 2019-09 and 2020-12 over the `jsonschema` crate.
//!
//! `jsonschema` owns validation semantics. What it does not do is change
//! the payload, so every validator here runs two passes:
//!
//! 1. [`shape::Shaper`] walks schema and payload together, coercing scalar
//!    types, filling `default`s, removing undeclared properties, and
//!    evaluating custom keywords.
//! 2. The `jsonschema::Validator` checks the shaped payload.
//!
//! Serializers skip both passes and render through
//! [`serialize::DraftSerializer`].

mod serialize;
mod shape;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use jsonschema::Draft;
use parking_lot::{Mutex, RwLock};
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::artifact::{
    ArtifactKind, ArtifactSource, CompiledArtifact, ValidationFailure, ValidationIssue,
};
use crate::engine::SchemaEngine;
use crate::error::EngineError;
use crate::extension::{
    localize_all, FormatCheck, KeywordCheck, MessageLocalizer, ReferenceResolver,
};
use crate::localize::portable_localizers;
use crate::options::{EngineMode, EngineOptions};
use crate::registry::{normalize_id, RegistryRetriever, SchemaRegistry};
use crate::standalone::{PortableExtensions, StandaloneBundle};

use self::serialize::DraftSerializer;
use self::shape::Shaper;

/// Recursion limit for the shaping and serializing walks.
pub(crate) const MAX_DEPTH: usize = 64;

/// JSON Schema engine backed by `jsonschema`.
pub struct DraftEngine {
    mode: EngineMode,
    options: EngineOptions,
    resolver: Option<Arc<dyn ReferenceResolver>>,
    formats: BTreeMap<String, FormatCheck>,
    /// Regex source of the formats registered as patterns.
    format_patterns: BTreeMap<String, String>,
    format_assertion: bool,
    keywords: Vec<(String, Arc<dyn KeywordCheck>)>,
    localizers: Vec<Arc<dyn MessageLocalizer>>,
    registry: RwLock<SchemaRegistry>,
}

impl DraftEngine {
    pub fn new(
        mode: EngineMode,
        options: EngineOptions,
        resolver: Option<Arc<dyn ReferenceResolver>>,
    ) -> Self {
        Self {
            mode,
            options,
            resolver,
            formats: BTreeMap::new(),
            format_patterns: BTreeMap::new(),
            format_assertion: false,
            keywords: Vec::new(),
            localizers: Vec::new(),
            registry: RwLock::new(SchemaRegistry::new()),
        }
    }

    fn draft(&self) -> Draft {
        match self.mode {
            EngineMode::Draft2019_09 => Draft::Draft201909,
            EngineMode::Draft2020_12 => Draft::Draft202012,
            _ => Draft::Draft7,
        }
    }

    fn asserts_formats(&self) -> bool {
        self.format_assertion && self.options.validate_formats
    }

    /// Registered documents as the walks and `jsonschema` see them.
    fn prepared_documents(&self) -> BTreeMap<String, Value> {
        let registry = self.registry.read();
        registry
            .documents()
            .iter()
            .map(|(id, doc)| (id.clone(), self.prepare(doc)))
            .collect()
    }

    fn prepare(&self, schema: &Value) -> Value {
        let mut prepared = schema.clone();
        if self.options.nullable {
            normalize_nullable(&mut prepared);
        }
        prepared
    }

    fn build_validator(
        &self,
        schema: &Value,
        schema_id: Option<&str>,
        documents: BTreeMap<String, Value>,
    ) -> Result<jsonschema::Validator, EngineError> {
        let mut opts = jsonschema::options();
        opts.with_draft(self.draft());
        opts.should_validate_formats(self.asserts_formats());
        for (name, check) in &self.formats {
            let check = Arc::clone(check);
            opts.with_format(name.clone(), move |s: &str| check(s));
        }
        opts.with_retriever(RegistryRetriever::new(documents, self.resolver.clone()));
        opts.build(schema)
            .map_err(|e| EngineError::compile(schema_id, e.to_string()))
    }

    fn source_for(&self, schema: &Value) -> Option<ArtifactSource> {
        self.options.code.source.then(|| ArtifactSource {
            schema: schema.clone(),
            mode: self.mode,
        })
    }

    fn build_validate_artifact(
        &self,
        schema: &Value,
        schema_id: Option<&str>,
    ) -> Result<CompiledArtifact, EngineError> {
        check_schema_shape(schema, schema_id)?;
        let prepared = self.prepare(schema);
        let documents = self.prepared_documents();
        let validator = self.build_validator(&prepared, schema_id, documents.clone())?;
        let shaper = Shaper::new(
            SchemaSet::new(prepared.clone(), documents),
            &self.options,
            self.keywords.clone(),
        );
        let all_errors = self.options.all_errors;
        let localizers = self.localizers.clone();
        let original = schema.clone();

        Ok(CompiledArtifact::validator(
            move |payload: &mut Value| {
                let keyword_issues = shaper.shape(payload);
                let mut issues: Vec<ValidationIssue> = if all_errors {
                    validator
                        .iter_errors(payload)
                        .map(|e| issue_from_error(&e, &prepared))
                        .collect()
                } else {
                    validator
                        .iter_errors(payload)
                        .next()
                        .map(|e| issue_from_error(&e, &prepared))
                        .into_iter()
                        .collect()
                };
                if all_errors {
                    issues.extend(keyword_issues);
                } else if issues.is_empty() {
                    issues.extend(keyword_issues.into_iter().take(1));
                }
                if issues.is_empty() {
                    return Ok(());
                }
                localize_all(&localizers, &mut issues, &original);
                Err(ValidationFailure::new(issues))
            },
            self.source_for(schema),
        ))
    }

    fn build_serialize_artifact(
        &self,
        schema: &Value,
        schema_id: Option<&str>,
    ) -> Result<CompiledArtifact, EngineError> {
        check_schema_shape(schema, schema_id)?;
        let prepared = self.prepare(schema);
        let documents = self.prepared_documents();
        // Only for the compile-time checks; serialization never validates.
        self.build_validator(&prepared, schema_id, documents.clone())?;
        let serializer = DraftSerializer::new(SchemaSet::new(prepared, documents));
        Ok(CompiledArtifact::serializer(
            move |value: &Value| serializer.render(value),
            self.source_for(schema),
        ))
    }

    /// Formats and localizers as data, or `NotPortable` for the first
    /// extension that is code.
    fn portable_extensions(&self) -> Result<PortableExtensions, EngineError> {
        if let Some(name) = self
            .formats
            .keys()
            .find(|name| !self.format_patterns.contains_key(*name))
        {
            return Err(EngineError::NotPortable(format!("format '{name}'")));
        }
        if let Some((name, _)) = self.keywords.first() {
            return Err(EngineError::NotPortable(format!("keyword '{name}'")));
        }
        Ok(PortableExtensions {
            formats: self.format_patterns.clone(),
            localizers: portable_localizers(&self.localizers)?,
        })
    }

    fn compile_kind(&self, schema: &Value, kind: ArtifactKind) -> Result<CompiledArtifact, EngineError> {
        let schema_id = schema_id_of(schema);
        if let Some(id) = schema_id {
            if self.registry.read().contains(id) {
                return Err(EngineError::DuplicateId(normalize_id(id).to_string()));
            }
        }
        let artifact = match kind {
            ArtifactKind::Validator => self.build_validate_artifact(schema, schema_id)?,
            ArtifactKind::Serializer => self.build_serialize_artifact(schema, schema_id)?,
        };
        match schema_id {
            Some(id) => {
                let mut registry = self.registry.write();
                let id = registry.insert_document(id, schema.clone())?;
                Ok(registry.insert_artifact(kind, &id, artifact))
            }
            None => Ok(artifact),
        }
    }
}

impl SchemaEngine for DraftEngine {
    fn mode(&self) -> EngineMode {
        self.mode
    }

    fn options(&self) -> &EngineOptions {
        &self.options
    }

    fn add_schema(&mut self, key: &str, schema: Value) -> Result<(), EngineError> {
        check_schema_shape(&schema, Some(key))?;
        self.registry.get_mut().insert_document(key, schema)?;
        Ok(())
    }

    fn has_schema(&self, id: &str) -> bool {
        self.registry.read().contains(id)
    }

    fn get_schema(
        &self,
        id: &str,
        kind: ArtifactKind,
    ) -> Result<Option<CompiledArtifact>, EngineError> {
        let document = {
            let registry = self.registry.read();
            if let Some(artifact) = registry.artifact(kind, id) {
                return Ok(Some(artifact));
            }
            match registry.document(id) {
                Some(doc) => doc.clone(),
                None => return Ok(None),
            }
        };
        let artifact = match kind {
            ArtifactKind::Validator => self.build_validate_artifact(&document, Some(id))?,
            ArtifactKind::Serializer => self.build_serialize_artifact(&document, Some(id))?,
        };
        Ok(Some(self.registry.write().insert_artifact(kind, id, artifact)))
    }

    fn compile(&self, schema: &Value) -> Result<CompiledArtifact, EngineError> {
        self.compile_kind(schema, ArtifactKind::Validator)
    }

    fn compile_serializer(&self, schema: &Value) -> Result<CompiledArtifact, EngineError> {
        self.compile_kind(schema, ArtifactKind::Serializer)
    }

    fn add_format(&mut self, name: &str, check: FormatCheck) -> Result<(), EngineError> {
        self.format_patterns.remove(name);
        self.formats.insert(name.to_string(), check);
        Ok(())
    }

    fn add_pattern_format(&mut self, name: &str, pattern: &str) -> Result<(), EngineError> {
        let regex = Regex::new(pattern).map_err(|e| {
            EngineError::Configuration(format!("format '{name}' has an invalid regex: {e}"))
        })?;
        self.formats
            .insert(name.to_string(), Arc::new(move |s: &str| regex.is_match(s)));
        self.format_patterns
            .insert(name.to_string(), pattern.to_string());
        Ok(())
    }

    fn enable_format_assertion(&mut self) {
        self.format_assertion = true;
    }

    fn format_assertion(&self) -> bool {
        self.asserts_formats()
    }

    fn add_keyword(&mut self, name: &str, check: Arc<dyn KeywordCheck>) -> Result<(), EngineError> {
        if self.keywords.iter().any(|(existing, _)| existing == name) {
            return Err(EngineError::Configuration(format!(
                "keyword '{name}' is already defined"
            )));
        }
        self.keywords.push((name.to_string(), check));
        Ok(())
    }

    fn add_localizer(&mut self, localizer: Arc<dyn MessageLocalizer>) {
        self.localizers.push(localizer);
    }

    fn standalone_source(&self, artifact: &CompiledArtifact) -> Result<String, EngineError> {
        if !self.options.code.source {
            return Err(EngineError::SourceEmissionDisabled);
        }
        let source = artifact.source().ok_or(EngineError::MissingSource)?;
        let extensions = self.portable_extensions()?;
        let registry = self.registry.read();
        StandaloneBundle::for_artifact(
            artifact.kind(),
            source,
            &self.options,
            self.asserts_formats(),
            &registry,
            extensions,
        )
        .to_source()
    }
}

pub(crate) fn schema_id_of(schema: &Value) -> Option<&str> {
    schema.get("$id").and_then(Value::as_str)
}

fn check_schema_shape(schema: &Value, schema_id: Option<&str>) -> Result<(), EngineError> {
    match schema {
        Value::Object(_) | Value::Bool(_) => Ok(()),
        other => Err(EngineError::compile(
            schema_id,
            format!("schema must be an object or boolean, got {other}"),
        )),
    }
}

/// Rewrite `nullable: true` into the draft vocabulary.
///
/// `type: T` becomes `type: [T, "null"]` and `null` joins any `enum`.
pub(crate) fn normalize_nullable(schema: &mut Value) {
    match schema {
        Value::Object(map) => {
            if map.get("nullable") == Some(&Value::Bool(true)) {
                let widened = match map.get("type") {
                    Some(Value::String(t)) if t != "null" => Some(json!([t, "null"])),
                    Some(Value::Array(types)) if !types.contains(&json!("null")) => {
                        let mut types = types.clone();
                        types.push(json!("null"));
                        Some(Value::Array(types))
                    }
                    _ => None,
                };
                if let Some(widened) = widened {
                    map.insert("type".to_string(), widened);
                }
                if let Some(Value::Array(values)) = map.get_mut("enum") {
                    if !values.contains(&Value::Null) {
                        values.push(Value::Null);
                    }
                }
            }
            for (key, child) in map.iter_mut() {
                if !matches!(key.as_str(), "enum" | "const" | "default" | "examples") {
                    normalize_nullable(child);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(normalize_nullable),
        _ => {}
    }
}

/// A root schema plus the documents its `$ref`s may reach.
pub(crate) struct SchemaSet {
    root: Value,
    root_id: Option<String>,
    documents: BTreeMap<String, Value>,
}

impl SchemaSet {
    pub(crate) fn new(root: Value, documents: BTreeMap<String, Value>) -> Self {
        let root_id = schema_id_of(&root).map(|id| normalize_id(id).to_string());
        Self {
            root,
            root_id,
            documents,
        }
    }

    pub(crate) fn root(&self) -> &Value {
        &self.root
    }

    /// Resolve a `$ref` seen inside `doc`. Returns the target and the
    /// document it lives in. Anchors are not resolved.
    pub(crate) fn resolve<'a>(&'a self, reference: &str, doc: &'a Value) -> Option<(&'a Value, &'a Value)> {
        let (base, fragment) = reference.split_once('#').unwrap_or((reference, ""));
        let target_doc = if base.is_empty() {
            doc
        } else if self.root_id.as_deref() == Some(normalize_id(base)) {
            &self.root
        } else {
            self.documents.get(normalize_id(base))?
        };
        if fragment.is_empty() {
            Some((target_doc, target_doc))
        } else if fragment.starts_with('/') {
            target_doc.pointer(fragment).map(|target| (target, target_doc))
        } else {
            None
        }
    }
}

/// Compiled `patternProperties` regexes, built on first use.
#[derive(Default)]
pub(crate) struct PatternCache {
    compiled: Mutex<HashMap<String, Option<Regex>>>,
}

impl PatternCache {
    /// Whether `key` matches `pattern`. Patterns `regex` cannot compile
    /// never match.
    pub(crate) fn is_match(&self, pattern: &str, key: &str) -> bool {
        let mut compiled = self.compiled.lock();
        compiled
            .entry(pattern.to_string())
            .or_insert_with(|| Regex::new(pattern).ok())
            .as_ref()
            .is_some_and(|re| re.is_match(key))
    }
}

/// Escape one JSON pointer segment.
pub(crate) fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

fn issue_from_error(error: &jsonschema::ValidationError<'_>, schema: &Value) -> ValidationIssue {
    let schema_path = error.schema_path.to_string();
    let message = error.to_string();
    let keyword = keyword_of(&schema_path);
    let keyword_value = schema.pointer(&schema_path);
    let params = params_for(&keyword, &message, keyword_value);
    ValidationIssue {
        keyword,
        instance_path: error.instance_path.to_string(),
        schema_path: format!("#{schema_path}"),
        message,
        params,
    }
}

/// The keyword a schema path ends in, skipping array indices.
fn keyword_of(schema_path: &str) -> String {
    schema_path
        .rsplit('/')
        .find(|segment| !segment.is_empty() && !segment.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or("schema")
        .replace("~1", "/")
        .replace("~0", "~")
}

fn params_for(keyword: &str, message: &str, keyword_value: Option<&Value>) -> Map<String, Value> {
    let mut params = Map::new();
    match keyword {
        "required" => {
            if let Some(name) = quoted_name(message) {
                params.insert("missingProperty".into(), Value::String(name));
            }
        }
        "additionalProperties" => {
            if let Some(name) = quoted_name(message) {
                params.insert("additionalProperty".into(), Value::String(name));
            }
        }
        "type" | "format" | "pattern" => {
            if let Some(v) = keyword_value {
                params.insert(keyword.into(), v.clone());
            }
        }
        "enum" => {
            if let Some(v) = keyword_value {
                params.insert("allowedValues".into(), v.clone());
            }
        }
        "const" => {
            if let Some(v) = keyword_value {
                params.insert("allowedValue".into(), v.clone());
            }
        }
        "minimum" | "maximum" | "exclusiveMinimum" | "exclusiveMaximum" | "multipleOf"
        | "minLength" | "maxLength" | "minItems" | "maxItems" | "minProperties"
        | "maxProperties" => {
            if let Some(v) = keyword_value {
                params.insert("limit".into(), v.clone());
            }
        }
        _ => {}
    }
    params
}

/// The first single- or double-quoted name in a message.
fn quoted_name(message: &str) -> Option<String> {
    let start = message.find(|c| c == '"' || c == '\'')?;
    let quote = message[start..].chars().next()?;
    let rest = &message[start + 1..];
    let end = rest.find(quote)?;
    Some(rest[..end].to_string())
}
