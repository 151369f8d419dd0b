//! # Compiler Pool
//!
//! Memoizes compilers by configuration. Two requests with the same external
//! schemas, custom options, mode and plugins get the same `Arc<Compiler>`,
//! so the engine behind it is built and configured exactly once.
//!
//! The pool key is a SHA-256 over the RFC 8785 canonical form of each part,
//! so key order inside schemas and options does not matter. `on_create`
//! and `resolver` have no stable identity and are not part of the key: two
//! option sets differing only in those share a compiler.
//!
//! Builds are serialized per key, not pool-wide. Plugins and `on_create`
//! run with no pool lock held except the gate of their own key, so a hook
//! may build other configurations from the same pool. A hook that asks
//! the pool for its own configuration waits on itself and never returns.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use scp_core::{CanonicalBytes, ExternalSchemaMap, Fingerprint};
use scp_engine::ArtifactKind;

use crate::compiler::Compiler;
use crate::error::CompilerError;
use crate::options::CompilerOptions;

/// Owned by the host for the life of the process. No eviction.
pub struct CompilerPool {
    kind: ArtifactKind,
    compilers: Mutex<HashMap<Fingerprint, Arc<Compiler>>>,
    /// One gate per key with a build in flight or a failed build.
    building: Mutex<HashMap<Fingerprint, Arc<Mutex<()>>>>,
}

impl CompilerPool {
    pub fn new(kind: ArtifactKind) -> Self {
        Self {
            kind,
            compilers: Mutex::new(HashMap::new()),
            building: Mutex::new(HashMap::new()),
        }
    }

    /// A pool whose compilers produce validators.
    pub fn validators() -> Self {
        Self::new(ArtifactKind::Validator)
    }

    /// A pool whose compilers produce serializers.
    pub fn serializers() -> Self {
        Self::new(ArtifactKind::Serializer)
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// The cached compiler for this configuration, built on first request.
    ///
    /// Concurrent callers with the same configuration never build two
    /// engines: they wait on that key's gate and receive the compiler the
    /// first caller built. A failed build leaves the pool unchanged.
    pub fn build_compiler(
        &self,
        external: &ExternalSchemaMap,
        options: &CompilerOptions,
    ) -> Result<Arc<Compiler>, CompilerError> {
        let key = Self::fingerprint(external, options)?;
        if let Some(compiler) = self.cached(&key) {
            return Ok(compiler);
        }

        let gate = Arc::clone(self.building.lock().entry(key).or_default());
        let _building = gate.lock();
        if let Some(compiler) = self.cached(&key) {
            return Ok(compiler);
        }

        let compiler = Arc::new(Compiler::with_fingerprint(
            external,
            options,
            self.kind,
            key,
        )?);
        tracing::info!(
            fingerprint = %key,
            kind = %self.kind,
            mode = %options.mode,
            external_schemas = external.len(),
            plugins = ?compiler.applied_plugins(),
            "constructed schema compiler"
        );
        self.compilers.lock().insert(key, Arc::clone(&compiler));
        self.building.lock().remove(&key);
        Ok(compiler)
    }

    fn cached(&self, key: &Fingerprint) -> Option<Arc<Compiler>> {
        let compiler = self.compilers.lock().get(key).map(Arc::clone)?;
        tracing::debug!(fingerprint = %key, kind = %self.kind, "compiler pool hit");
        Some(compiler)
    }

    /// The pool key for a configuration.
    ///
    /// # Errors
    ///
    /// `Fingerprint` if a schema or option cannot be canonicalized (for
    /// example a non-finite number).
    pub fn fingerprint(
        external: &ExternalSchemaMap,
        options: &CompilerOptions,
    ) -> Result<Fingerprint, CompilerError> {
        let plugins: Vec<Value> = options
            .plugins
            .iter()
            .map(|entry| json!({"name": entry.name(), "config": entry.config}))
            .collect();
        let parts = [
            CanonicalBytes::new(external)?,
            CanonicalBytes::new(&options.custom_options)?,
            CanonicalBytes::new(&options.mode)?,
            CanonicalBytes::new(&plugins)?,
        ];
        Ok(Fingerprint::of_parts(&parts))
    }

    pub fn len(&self) -> usize {
        self.compilers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.compilers.lock().is_empty()
    }

    pub fn contains(&self, key: &Fingerprint) -> bool {
        self.compilers.lock().contains_key(key)
    }
}

impl Default for CompilerPool {
    fn default() -> Self {
        Self::validators()
    }
}

impl std::fmt::Debug for CompilerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilerPool")
            .field("kind", &self.kind)
            .field("compilers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scp_engine::EngineMode;
    use serde_json::json;

    fn external() -> ExternalSchemaMap {
        let mut map = ExternalSchemaMap::new();
        map.insert("urn:a".into(), json!({"$id": "urn:a", "type": "string"}));
        map
    }

    #[test]
    fn test_same_configuration_same_compiler() {
        let pool = CompilerPool::validators();
        let opts = CompilerOptions::default().with_option("allErrors", json!(true));
        let a = pool.build_compiler(&external(), &opts).unwrap();
        let b = pool.build_compiler(&external(), &opts.clone()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(pool.len(), 1);
        assert!(pool.contains(a.fingerprint()));
    }

    #[test]
    fn test_option_key_order_does_not_matter() {
        let one = CompilerOptions::default().with_custom_options(json!({"allErrors": true, "nullable": false}));
        let two = CompilerOptions::default().with_custom_options(json!({"nullable": false, "allErrors": true}));
        assert_eq!(
            CompilerPool::fingerprint(&external(), &one).unwrap(),
            CompilerPool::fingerprint(&external(), &two).unwrap()
        );
    }

    #[test]
    fn test_mode_is_part_of_the_key() {
        let pool = CompilerPool::validators();
        let standard = pool
            .build_compiler(&ExternalSchemaMap::new(), &CompilerOptions::default())
            .unwrap();
        let jtd = pool
            .build_compiler(&ExternalSchemaMap::new(), &CompilerOptions::new(EngineMode::Jtd))
            .unwrap();
        assert!(!Arc::ptr_eq(&standard, &jtd));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_failed_build_inserts_nothing() {
        let pool = CompilerPool::validators();
        let opts = CompilerOptions::default().with_on_create(|_| {
            Err(scp_engine::EngineError::Configuration("nope".into()))
        });
        assert!(pool.build_compiler(&external(), &opts).is_err());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_on_create_may_build_another_configuration() {
        let pool = Arc::new(CompilerPool::validators());
        let inner = Arc::clone(&pool);
        let opts = CompilerOptions::default().with_on_create(move |_| {
            let companion = CompilerOptions::default().with_option("allErrors", json!(true));
            inner
                .build_compiler(&ExternalSchemaMap::new(), &companion)
                .map(|_| ())
                .map_err(|e| scp_engine::EngineError::Configuration(e.to_string()))
        });

        let (done, finished) = std::sync::mpsc::channel();
        let outer = Arc::clone(&pool);
        std::thread::spawn(move || {
            let built = outer.build_compiler(&external(), &opts).is_ok();
            let _ = done.send(built);
        });
        let built = finished
            .recv_timeout(std::time::Duration::from_secs(30))
            .expect("building from inside on_create must not block");
        assert!(built);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_failed_build_can_be_retried() {
        let pool = CompilerPool::validators();
        let failing = CompilerOptions::default().with_on_create(|_| {
            Err(scp_engine::EngineError::Configuration("nope".into()))
        });
        assert!(pool.build_compiler(&external(), &failing).is_err());
        // Same key: the hook is not part of it.
        let compiler = pool.build_compiler(&external(), &CompilerOptions::default()).unwrap();
        assert!(pool.contains(compiler.fingerprint()));
    }

    #[test]
    fn test_on_create_excluded_from_key() {
        let plain = CompilerOptions::default();
        let hooked = CompilerOptions::default().with_on_create(|_| Ok(()));
        assert_eq!(
            CompilerPool::fingerprint(&external(), &plain).unwrap(),
            CompilerPool::fingerprint(&external(), &hooked).unwrap()
        );
    }
}
