//! # Compiler
//!
//! One configured schema engine plus the per-route compile protocol.
//!
//! Construction order matters and is fixed:
//!
//! 1. resolve engine options (baseline overlaid by `customOptions`);
//! 2. create the engine for the mode;
//! 3. apply the caller's plugins, then the default formats plugin unless
//!    the caller supplied one named `formats` or the mode is JTD;
//! 4. run `on_create`;
//! 5. register every external schema.

use scp_core::{ExternalSchemaMap, Fingerprint, RouteSchemaDescriptor};
use scp_engine::{
    create_engine, ArtifactKind, CompiledArtifact, EngineError, EngineOptions, SchemaEngine,
};

use crate::error::CompilerError;
use crate::options::CompilerOptions;
use crate::plugin::{EnginePlugin, FormatsPlugin, PluginAdapter, PluginReport, FORMATS_PLUGIN};
use crate::pool::CompilerPool;

/// A configured engine that compiles route schemas of one artifact kind.
pub struct Compiler {
    engine: Box<dyn SchemaEngine>,
    kind: ArtifactKind,
    fingerprint: Fingerprint,
    plugins: PluginReport,
}

impl Compiler {
    /// Build a compiler outside any pool.
    ///
    /// # Errors
    ///
    /// `Configuration` for unusable custom options, `Plugin` when a plugin
    /// fails, and engine errors from `on_create` or from registering an
    /// external schema.
    pub fn new(
        external: &ExternalSchemaMap,
        options: &CompilerOptions,
        kind: ArtifactKind,
    ) -> Result<Self, CompilerError> {
        let fingerprint = CompilerPool::fingerprint(external, options)?;
        Self::with_fingerprint(external, options, kind, fingerprint)
    }

    pub(crate) fn with_fingerprint(
        external: &ExternalSchemaMap,
        options: &CompilerOptions,
        kind: ArtifactKind,
        fingerprint: Fingerprint,
    ) -> Result<Self, CompilerError> {
        let resolved =
            EngineOptions::resolve(&options.custom_options).map_err(CompilerError::from_engine_setup)?;
        let engine_options = match kind {
            ArtifactKind::Validator => resolved,
            ArtifactKind::Serializer => resolved.for_serializer(),
        };
        let mut engine = create_engine(options.mode, engine_options, options.resolver.clone());

        let mut plugins = PluginAdapter::apply(engine.as_mut(), &options.plugins)?;
        if !plugins.contains(FORMATS_PLUGIN) && options.mode.is_draft() {
            FormatsPlugin
                .apply(engine.as_mut(), None)
                .map_err(|e| CompilerError::Plugin {
                    name: FORMATS_PLUGIN.to_string(),
                    reason: e.to_string(),
                })?;
            plugins.applied.push(FORMATS_PLUGIN.to_string());
        }

        if let Some(hook) = &options.on_create {
            hook(engine.as_mut())?;
        }

        for (key, document) in external {
            engine.add_schema(key, document.clone())?;
        }

        Ok(Self {
            engine,
            kind,
            fingerprint,
            plugins,
        })
    }

    /// Compile the schema of one route.
    ///
    /// A schema whose `$id` the engine already knows (an external schema or
    /// one compiled earlier) is not compiled again: the stored artifact is
    /// returned.
    ///
    /// # Errors
    ///
    /// `SchemaCompile` naming the route when the schema is invalid or a
    /// reference cannot be resolved.
    pub fn compile_route(
        &self,
        descriptor: &RouteSchemaDescriptor,
    ) -> Result<CompiledArtifact, CompilerError> {
        if let Some(id) = descriptor.schema_id() {
            if let Some(artifact) = self.known(id, descriptor)? {
                tracing::warn!(
                    schema_id = id,
                    method = %descriptor.method,
                    url = %descriptor.url,
                    part = %descriptor.http_part,
                    "schema $id already registered, reusing compiled artifact"
                );
                return Ok(artifact);
            }
        }

        let compiled = match self.kind {
            ArtifactKind::Validator => self.engine.compile(&descriptor.schema),
            ArtifactKind::Serializer => self.engine.compile_serializer(&descriptor.schema),
        };
        match compiled {
            Ok(artifact) => Ok(artifact),
            // Another route registered the same `$id` between the lookup and the compile.
            Err(EngineError::DuplicateId(id)) => self
                .known(&id, descriptor)?
                .ok_or_else(|| route_error(descriptor, format!("duplicate schema id '{id}'"))),
            Err(e) => Err(route_error(descriptor, e.to_string())),
        }
    }

    /// Standalone source text for an artifact this compiler produced.
    ///
    /// # Errors
    ///
    /// `SourceEmissionDisabled` unless the compiler was built with
    /// `code.source` on.
    pub fn standalone_source(&self, artifact: &CompiledArtifact) -> Result<String, CompilerError> {
        Ok(self.engine.standalone_source(artifact)?)
    }

    fn known(
        &self,
        id: &str,
        descriptor: &RouteSchemaDescriptor,
    ) -> Result<Option<CompiledArtifact>, CompilerError> {
        self.engine
            .get_schema(id, self.kind)
            .map_err(|e| route_error(descriptor, e.to_string()))
    }

    pub fn engine(&self) -> &dyn SchemaEngine {
        self.engine.as_ref()
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// The pool key this compiler was built for.
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Plugin names in the order they were applied, default formats included.
    pub fn applied_plugins(&self) -> &[String] {
        &self.plugins.applied
    }
}

impl std::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("mode", &self.engine.mode())
            .field("kind", &self.kind)
            .field("fingerprint", &self.fingerprint.to_string())
            .field("plugins", &self.plugins.applied)
            .finish()
    }
}

fn route_error(descriptor: &RouteSchemaDescriptor, reason: String) -> CompilerError {
    CompilerError::SchemaCompile {
        method: descriptor.method.clone(),
        url: descriptor.url.clone(),
        http_part: descriptor.http_part,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scp_core::HttpPart;
    use scp_engine::EngineMode;
    use serde_json::{json, Value};

    fn body(schema: Value) -> RouteSchemaDescriptor {
        RouteSchemaDescriptor::new("POST", "/items", HttpPart::Body, schema)
    }

    fn validator(external: &ExternalSchemaMap, options: &CompilerOptions) -> Compiler {
        Compiler::new(external, options, ArtifactKind::Validator).unwrap()
    }

    #[test]
    fn test_default_formats_plugin_applied() {
        let compiler = validator(&ExternalSchemaMap::new(), &CompilerOptions::default());
        assert_eq!(compiler.applied_plugins(), [FORMATS_PLUGIN]);
        assert!(compiler.engine().format_assertion());
    }

    #[test]
    fn test_jtd_skips_default_formats() {
        let compiler = validator(&ExternalSchemaMap::new(), &CompilerOptions::new(EngineMode::Jtd));
        assert!(compiler.applied_plugins().is_empty());
    }

    #[test]
    fn test_route_compile_error_names_route() {
        let compiler = validator(&ExternalSchemaMap::new(), &CompilerOptions::default());
        let err = compiler
            .compile_route(&body(json!({"type": "object", "properties": {"a": {"$ref": "urn:missing"}}})))
            .unwrap_err();
        match err {
            CompilerError::SchemaCompile { method, url, http_part, .. } => {
                assert_eq!(method, "POST");
                assert_eq!(url, "/items");
                assert_eq!(http_part, HttpPart::Body);
            }
            other => panic!("expected SchemaCompile, got {other:?}"),
        }
    }

    #[test]
    fn test_external_id_short_circuits() {
        let mut external = ExternalSchemaMap::new();
        external.insert("urn:item".into(), json!({"$id": "urn:item", "type": "object"}));
        let compiler = validator(&external, &CompilerOptions::default());
        let first = compiler.compile_route(&body(json!({"$id": "urn:item"}))).unwrap();
        let second = compiler
            .compile_route(&RouteSchemaDescriptor::new("PUT", "/other", HttpPart::Body, json!({"$id": "urn:item", "type": "string"})))
            .unwrap();
        assert!(first.ptr_eq(&second));
        // The registered document wins over the route's copy.
        assert!(second.is_valid(&mut json!({})));
    }

    #[test]
    fn test_serializer_compiler_does_not_coerce_or_strip() {
        let compiler = Compiler::new(
            &ExternalSchemaMap::new(),
            &CompilerOptions::default(),
            ArtifactKind::Serializer,
        )
        .unwrap();
        let options = compiler.engine().options();
        assert_eq!(options.coerce_types, scp_engine::CoerceTypes::Off);
        let artifact = compiler
            .compile_route(&body(json!({"type": "object", "properties": {"n": {"type": "integer"}}})).with_http_status("200"))
            .unwrap();
        assert_eq!(artifact.kind(), ArtifactKind::Serializer);
        assert_eq!(artifact.serialize(&json!({"n": 1, "secret": true})), r#"{"n":1}"#);
    }

    #[test]
    fn test_source_disabled_by_default() {
        let compiler = validator(&ExternalSchemaMap::new(), &CompilerOptions::default());
        let artifact = compiler.compile_route(&body(json!({"type": "string"}))).unwrap();
        assert!(matches!(
            compiler.standalone_source(&artifact),
            Err(CompilerError::Engine(EngineError::SourceEmissionDisabled))
        ));
    }

    #[test]
    fn test_bad_custom_options_are_configuration_errors() {
        let options = CompilerOptions::default().with_option("coerceTypes", json!("sometimes"));
        let err = Compiler::new(&ExternalSchemaMap::new(), &options, ArtifactKind::Validator).unwrap_err();
        assert!(matches!(err, CompilerError::Configuration(_)));
    }
}
