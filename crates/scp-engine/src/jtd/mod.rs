//! # JTD Engine
//!
//! JSON Type Definition (RFC 8927). A schema has exactly one form: empty,
//! `ref`, `type`, `enum`, `elements`, `properties`, `values` or
//! `discriminator`. Any form may add `nullable` and `metadata`; the root may
//! add `definitions` (and `$id`, used only as a registry key).
//!
//! Schemas are checked for well-formedness when compiled, so the validate
//! and serialize walks can assume a correct schema. JTD has no `format`
//! keyword and no custom keyword vocabulary; asking for either is an
//! `Unsupported` error. JTD validators do not reshape payloads.

mod serialize;
mod validate;

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::artifact::{ArtifactKind, ArtifactSource, CompiledArtifact, ValidationFailure};
use crate::engine::SchemaEngine;
use crate::error::EngineError;
use crate::extension::{localize_all, FormatCheck, KeywordCheck, MessageLocalizer};
use crate::localize::portable_localizers;
use crate::options::{EngineMode, EngineOptions};
use crate::registry::{normalize_id, SchemaRegistry};
use crate::standalone::{PortableExtensions, StandaloneBundle};

use self::serialize::JtdSerializer;
use self::validate::JtdValidator;

const TYPES: &[&str] = &[
    "boolean", "string", "timestamp", "float32", "float64", "int8", "uint8", "int16", "uint16",
    "int32", "uint32",
];

/// JSON Type Definition engine.
pub struct JtdEngine {
    options: EngineOptions,
    localizers: Vec<Arc<dyn MessageLocalizer>>,
    registry: RwLock<SchemaRegistry>,
}

impl JtdEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            options,
            localizers: Vec::new(),
            registry: RwLock::new(SchemaRegistry::new()),
        }
    }

    fn source_for(&self, schema: &Value) -> Option<ArtifactSource> {
        self.options.code.source.then(|| ArtifactSource {
            schema: schema.clone(),
            mode: EngineMode::Jtd,
        })
    }

    fn build(&self, schema: &Value, kind: ArtifactKind, schema_id: Option<&str>) -> Result<CompiledArtifact, EngineError> {
        check_root(schema).map_err(|reason| EngineError::compile(schema_id, reason))?;
        let source = self.source_for(schema);
        match kind {
            ArtifactKind::Validator => {
                let validator = JtdValidator::new(schema.clone(), self.options.all_errors);
                let localizers = self.localizers.clone();
                let original = schema.clone();
                Ok(CompiledArtifact::validator(
                    move |payload: &mut Value| {
                        let mut issues = validator.validate(payload);
                        if issues.is_empty() {
                            return Ok(());
                        }
                        localize_all(&localizers, &mut issues, &original);
                        Err(ValidationFailure::new(issues))
                    },
                    source,
                ))
            }
            ArtifactKind::Serializer => {
                let serializer = JtdSerializer::new(schema.clone());
                Ok(CompiledArtifact::serializer(
                    move |value: &Value| serializer.render(value),
                    source,
                ))
            }
        }
    }

    fn compile_kind(&self, schema: &Value, kind: ArtifactKind) -> Result<CompiledArtifact, EngineError> {
        let schema_id = schema.get("$id").and_then(Value::as_str);
        if let Some(id) = schema_id {
            if self.registry.read().contains(id) {
                return Err(EngineError::DuplicateId(normalize_id(id).to_string()));
            }
        }
        let artifact = self.build(schema, kind, schema_id)?;
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

impl SchemaEngine for JtdEngine {
    fn mode(&self) -> EngineMode {
        EngineMode::Jtd
    }

    fn options(&self) -> &EngineOptions {
        &self.options
    }

    fn add_schema(&mut self, key: &str, schema: Value) -> Result<(), EngineError> {
        check_root(&schema).map_err(|reason| EngineError::compile(Some(key), reason))?;
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
        let artifact = self.build(&document, kind, Some(id))?;
        Ok(Some(self.registry.write().insert_artifact(kind, id, artifact)))
    }

    fn compile(&self, schema: &Value) -> Result<CompiledArtifact, EngineError> {
        self.compile_kind(schema, ArtifactKind::Validator)
    }

    fn compile_serializer(&self, schema: &Value) -> Result<CompiledArtifact, EngineError> {
        self.compile_kind(schema, ArtifactKind::Serializer)
    }

    fn add_format(&mut self, _name: &str, _check: FormatCheck) -> Result<(), EngineError> {
        Err(EngineError::Unsupported {
            capability: "custom formats",
            mode: EngineMode::Jtd.to_string(),
        })
    }

    fn add_pattern_format(&mut self, _name: &str, _pattern: &str) -> Result<(), EngineError> {
        Err(EngineError::Unsupported {
            capability: "custom formats",
            mode: EngineMode::Jtd.to_string(),
        })
    }

    fn enable_format_assertion(&mut self) {}

    fn format_assertion(&self) -> bool {
        false
    }

    fn add_keyword(&mut self, _name: &str, _check: Arc<dyn KeywordCheck>) -> Result<(), EngineError> {
        Err(EngineError::Unsupported {
            capability: "custom keywords",
            mode: EngineMode::Jtd.to_string(),
        })
    }

    fn add_localizer(&mut self, localizer: Arc<dyn MessageLocalizer>) {
        self.localizers.push(localizer);
    }

    fn standalone_source(&self, artifact: &CompiledArtifact) -> Result<String, EngineError> {
        if !self.options.code.source {
            return Err(EngineError::SourceEmissionDisabled);
        }
        let source = artifact.source().ok_or(EngineError::MissingSource)?;
        let extensions = PortableExtensions {
            localizers: portable_localizers(&self.localizers)?,
            ..PortableExtensions::default()
        };
        let registry = self.registry.read();
        StandaloneBundle::for_artifact(
            artifact.kind(),
            source,
            &self.options,
            false,
            &registry,
            extensions,
        )
        .to_source()
    }
}

/// Check that `schema` is a well-formed root JTD schema.
fn check_root(schema: &Value) -> Result<(), String> {
    let obj = schema
        .as_object()
        .ok_or_else(|| "JTD schema must be an object".to_string())?;
    let definitions = match obj.get("definitions") {
        None => Map::new(),
        Some(Value::Object(defs)) => defs.clone(),
        Some(_) => return Err("definitions must be an object".into()),
    };
    for (name, def) in &definitions {
        check_form(def, &definitions, false)
            .map_err(|reason| format!("definitions/{name}: {reason}"))?;
    }
    check_form(schema, &definitions, true)
}

fn check_form(schema: &Value, definitions: &Map<String, Value>, is_root: bool) -> Result<(), String> {
    let obj = schema
        .as_object()
        .ok_or_else(|| "schema must be an object".to_string())?;

    for key in obj.keys() {
        let allowed = matches!(
            key.as_str(),
            "nullable" | "metadata" | "ref" | "type" | "enum" | "elements" | "properties"
                | "optionalProperties" | "additionalProperties" | "values" | "discriminator"
                | "mapping"
        ) || (is_root && matches!(key.as_str(), "definitions" | "$id"));
        if !allowed {
            return Err(format!("unknown keyword '{key}'"));
        }
    }
    if let Some(nullable) = obj.get("nullable") {
        if !nullable.is_boolean() {
            return Err("nullable must be a boolean".into());
        }
    }
    if let Some(metadata) = obj.get("metadata") {
        if !metadata.is_object() {
            return Err("metadata must be an object".into());
        }
    }

    let has = |k: &str| obj.contains_key(k);
    let forms = [
        has("ref"),
        has("type"),
        has("enum"),
        has("elements"),
        has("properties") || has("optionalProperties"),
        has("values"),
        has("discriminator"),
    ];
    if forms.iter().filter(|present| **present).count() > 1 {
        return Err("schema mixes keywords of more than one form".into());
    }
    if has("additionalProperties") && !(has("properties") || has("optionalProperties")) {
        return Err("additionalProperties requires properties or optionalProperties".into());
    }
    if has("mapping") != has("discriminator") {
        return Err("discriminator and mapping must appear together".into());
    }

    if let Some(reference) = obj.get("ref") {
        let name = reference.as_str().ok_or("ref must be a string")?;
        if !definitions.contains_key(name) {
            return Err(format!("ref '{name}' is not defined"));
        }
    }
    if let Some(ty) = obj.get("type") {
        let name = ty.as_str().ok_or("type must be a string")?;
        if !TYPES.contains(&name) {
            return Err(format!("unknown type '{name}'"));
        }
    }
    if let Some(values) = obj.get("enum") {
        let values = values.as_array().ok_or("enum must be an array")?;
        if values.is_empty() {
            return Err("enum must not be empty".into());
        }
        let mut seen = HashSet::new();
        for v in values {
            let s = v.as_str().ok_or("enum values must be strings")?;
            if !seen.insert(s) {
                return Err(format!("enum value '{s}' is repeated"));
            }
        }
    }
    if let Some(elements) = obj.get("elements") {
        check_form(elements, definitions, false)?;
    }
    let required = obj.get("properties").map(as_schema_map).transpose()?;
    let optional = obj.get("optionalProperties").map(as_schema_map).transpose()?;
    if let (Some(required), Some(optional)) = (required, optional) {
        if let Some(key) = required.keys().find(|k| optional.contains_key(*k)) {
            return Err(format!("property '{key}' is both required and optional"));
        }
    }
    for props in [required, optional].into_iter().flatten() {
        for sub in props.values() {
            check_form(sub, definitions, false)?;
        }
    }
    if let Some(additional) = obj.get("additionalProperties") {
        if !additional.is_boolean() {
            return Err("additionalProperties must be a boolean".into());
        }
    }
    if let Some(values) = obj.get("values") {
        check_form(values, definitions, false)?;
    }
    if let Some(tag) = obj.get("discriminator") {
        let tag = tag.as_str().ok_or("discriminator must be a string")?;
        let mapping = obj
            .get("mapping")
            .and_then(Value::as_object)
            .ok_or("mapping must be an object")?;
        for (name, variant) in mapping {
            check_form(variant, definitions, false)
                .map_err(|reason| format!("mapping/{name}: {reason}"))?;
            let variant = variant.as_object().ok_or("mapping values must be objects")?;
            if !(variant.contains_key("properties") || variant.contains_key("optionalProperties")) {
                return Err(format!("mapping/{name} must be of the properties form"));
            }
            if variant.get("nullable") == Some(&Value::Bool(true)) {
                return Err(format!("mapping/{name} must not be nullable"));
            }
            let redefines_tag = ["properties", "optionalProperties"].iter().any(|k| {
                variant
                    .get(*k)
                    .and_then(Value::as_object)
                    .is_some_and(|p| p.contains_key(tag))
            });
            if redefines_tag {
                return Err(format!("mapping/{name} redefines discriminator '{tag}'"));
            }
        }
    }
    Ok(())
}

fn as_schema_map(value: &Value) -> Result<&Map<String, Value>, String> {
    value
        .as_object()
        .ok_or_else(|| "properties must be an object".to_string())
}
