//! # Compiler Options
//!
//! Everything that decides how a compiler's engine is built. Equal options
//! (with equal external schemas) share one compiler in the pool; see
//! [`crate::pool::CompilerPool::fingerprint`] for which fields count.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use scp_engine::{EngineError, EngineMode, ReferenceResolver, SchemaEngine};

use crate::plugin::{EnginePlugin, PluginEntry};

/// Called once with the freshly configured engine, after plugins.
///
/// A hook may build compilers for other configurations from the pool that
/// is building this one. Asking for this compiler's own configuration
/// blocks forever.
pub type OnCreateHook = Arc<dyn Fn(&mut dyn SchemaEngine) -> Result<(), EngineError> + Send + Sync>;

/// Options for building a [`crate::Compiler`].
#[derive(Clone, Default)]
pub struct CompilerOptions {
    pub mode: EngineMode,
    /// Overrides on top of the engine baseline. Caller wins.
    pub custom_options: Map<String, Value>,
    /// Applied in order, each exactly once per engine.
    pub plugins: Vec<PluginEntry>,
    pub on_create: Option<OnCreateHook>,
    /// Fallback for `$ref` URIs no registered schema answers.
    pub resolver: Option<Arc<dyn ReferenceResolver>>,
}

impl CompilerOptions {
    pub fn new(mode: EngineMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Replace the custom options.
    ///
    /// Anything other than a JSON object is treated as empty.
    pub fn with_custom_options(mut self, custom: Value) -> Self {
        self.custom_options = match custom {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self
    }

    /// Set one custom option.
    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.custom_options.insert(key.into(), value);
        self
    }

    pub fn with_plugin(mut self, plugin: impl EnginePlugin + 'static) -> Self {
        self.plugins.push(PluginEntry::new(Arc::new(plugin)));
        self
    }

    pub fn with_plugin_config(mut self, plugin: impl EnginePlugin + 'static, config: Value) -> Self {
        self.plugins
            .push(PluginEntry::new(Arc::new(plugin)).with_config(config));
        self
    }

    pub fn with_on_create<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut dyn SchemaEngine) -> Result<(), EngineError> + Send + Sync + 'static,
    {
        self.on_create = Some(Arc::new(hook));
        self
    }

    pub fn with_resolver(mut self, resolver: impl ReferenceResolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }
}

impl fmt::Debug for CompilerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompilerOptions")
            .field("mode", &self.mode)
            .field("custom_options", &self.custom_options)
            .field("plugins", &self.plugins)
            .field("on_create", &self.on_create.is_some())
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

/// The data part of [`CompilerOptions`], as read from a config file.
///
/// ```yaml
/// mode: "2020"
/// customOptions:
///   allErrors: true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerConfig {
    pub mode: EngineMode,
    pub custom_options: Map<String, Value>,
}

impl From<CompilerConfig> for CompilerOptions {
    fn from(config: CompilerConfig) -> Self {
        Self {
            mode: config.mode,
            custom_options: config.custom_options,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_sets_fields() {
        let opts = CompilerOptions::new(EngineMode::Jtd)
            .with_custom_options(json!({"allErrors": true}))
            .with_option("nullable", json!(false))
            .with_on_create(|_| Ok(()));
        assert_eq!(opts.mode, EngineMode::Jtd);
        assert_eq!(opts.custom_options.len(), 2);
        assert!(opts.on_create.is_some());
        assert!(opts.resolver.is_none());
    }

    #[test]
    fn test_non_object_custom_options_are_empty() {
        let opts = CompilerOptions::default().with_custom_options(json!([1, 2]));
        assert!(opts.custom_options.is_empty());
    }

    #[test]
    fn test_config_from_yaml() {
        let config: CompilerConfig =
            serde_json::from_value(json!({"mode": "JTD", "customOptions": {"allErrors": true}}))
                .unwrap();
        let opts = CompilerOptions::from(config);
        assert_eq!(opts.mode, EngineMode::Jtd);
        assert_eq!(opts.custom_options["allErrors"], json!(true));
    }

    #[test]
    fn test_config_rejects_unknown_mode() {
        let result: Result<CompilerConfig, _> = serde_json::from_value(json!({"mode": "draft-03"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_hides_closures() {
        let opts = CompilerOptions::default().with_on_create(|_| Ok(()));
        let text = format!("{opts:?}");
        assert!(text.contains("on_create: true"));
    }
}
