//! # Plugins
//!
//! A plugin customizes an engine once, while its compiler is being built:
//! it may register formats, keywords, or message localizers. Plugins are
//! applied in the order the caller lists them.
//!
//! Three plugins ship with the crate:
//!
//! - [`FormatsPlugin`] (`formats`) turns on `format` assertion and registers
//!   extra regex formats. Compilers apply it by default unless the caller
//!   supplied a plugin with the same name.
//! - [`ErrorMessagePlugin`] (`errorMessage`) replaces messages with the
//!   `errorMessage` the schema itself declares.
//! - [`LocalizePlugin`] (`localize`) rewrites messages from a keyword
//!   template catalog.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use scp_engine::{CatalogLocalizer, EngineError, ErrorMessageLocalizer, SchemaEngine};

use crate::error::CompilerError;

/// Name of the plugin that suppresses the default formats plugin.
pub const FORMATS_PLUGIN: &str = "formats";

/// An engine customization, applied once per engine.
///
/// `apply` runs while the pool holds the build gate of this configuration;
/// the same reentrancy rule as [`crate::OnCreateHook`] applies.
pub trait EnginePlugin: Send + Sync {
    /// Stable identity. Part of the compiler pool key.
    fn name(&self) -> &str;

    /// Customize `engine`. `config` is the value paired with the plugin.
    fn apply(&self, engine: &mut dyn SchemaEngine, config: Option<&Value>) -> Result<(), EngineError>;
}

/// A plugin and the configuration it is applied with.
#[derive(Clone)]
pub struct PluginEntry {
    pub extension: Arc<dyn EnginePlugin>,
    pub config: Option<Value>,
}

impl PluginEntry {
    pub fn new(extension: Arc<dyn EnginePlugin>) -> Self {
        Self {
            extension,
            config: None,
        }
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = Some(config);
        self
    }

    pub fn name(&self) -> &str {
        self.extension.name()
    }
}

impl fmt::Debug for PluginEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginEntry")
            .field("name", &self.name())
            .field("config", &self.config)
            .finish()
    }
}

/// Names of the plugins applied to one engine, in application order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginReport {
    pub applied: Vec<String>,
}

impl PluginReport {
    pub fn contains(&self, name: &str) -> bool {
        self.applied.iter().any(|n| n == name)
    }
}

/// Applies plugin entries to an engine.
pub struct PluginAdapter;

impl PluginAdapter {
    /// Apply every entry in order. Stops at the first failure.
    ///
    /// # Errors
    ///
    /// `CompilerError::Plugin` naming the plugin that failed.
    pub fn apply(
        engine: &mut dyn SchemaEngine,
        plugins: &[PluginEntry],
    ) -> Result<PluginReport, CompilerError> {
        let mut report = PluginReport::default();
        for entry in plugins {
            let name = entry.name().to_string();
            entry
                .extension
                .apply(engine, entry.config.as_ref())
                .map_err(|e| CompilerError::Plugin {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            tracing::debug!(plugin = %name, mode = %engine.mode(), "applied engine plugin");
            report.applied.push(name);
        }
        Ok(report)
    }
}

// -- formats ------------------------------------------------------------------

/// Turns on `format` assertion.
///
/// Config, optional: `{"formats": {"<name>": "<regex>"}}` registers each
/// name as a format matching the regex. The regex is not anchored: `T-[0-9]+`
/// accepts `xT-1y`. Write `^T-[0-9]+$` to match the whole string.
///
/// Regex formats are data, so they survive standalone emission.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatsPlugin;

impl EnginePlugin for FormatsPlugin {
    fn name(&self) -> &str {
        FORMATS_PLUGIN
    }

    fn apply(&self, engine: &mut dyn SchemaEngine, config: Option<&Value>) -> Result<(), EngineError> {
        engine.enable_format_assertion();
        let Some(formats) = config.and_then(|c| c.get("formats")) else {
            return Ok(());
        };
        let formats = formats.as_object().ok_or_else(|| {
            EngineError::Configuration("'formats' must be an object of regexes".into())
        })?;
        for (name, pattern) in formats {
            let pattern = pattern.as_str().ok_or_else(|| {
                EngineError::Configuration(format!("format '{name}' must be a regex string"))
            })?;
            engine.add_pattern_format(name, pattern)?;
        }
        Ok(())
    }
}

// -- errorMessage ---------------------------------------------------------------

/// Honours `errorMessage` declared in the schema, through
/// [`ErrorMessageLocalizer`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorMessagePlugin;

impl EnginePlugin for ErrorMessagePlugin {
    fn name(&self) -> &str {
        "errorMessage"
    }

    fn apply(&self, engine: &mut dyn SchemaEngine, _config: Option<&Value>) -> Result<(), EngineError> {
        engine.add_localizer(Arc::new(ErrorMessageLocalizer));
        Ok(())
    }
}

// -- localize -------------------------------------------------------------------

/// Rewrites messages from a keyword catalog.
///
/// Config: `{"messages": {"<keyword>": "<template>"}}`. See
/// [`CatalogLocalizer`] for the placeholders.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalizePlugin;

impl EnginePlugin for LocalizePlugin {
    fn name(&self) -> &str {
        "localize"
    }

    fn apply(&self, engine: &mut dyn SchemaEngine, config: Option<&Value>) -> Result<(), EngineError> {
        let messages = match config.and_then(|c| c.get("messages")) {
            None => return Ok(()),
            Some(Value::Object(messages)) => messages,
            Some(_) => {
                return Err(EngineError::Configuration(
                    "'messages' must be an object of templates".into(),
                ))
            }
        };
        let mut catalog = BTreeMap::new();
        for (keyword, template) in messages {
            let template = template.as_str().ok_or_else(|| {
                EngineError::Configuration(format!("template for '{keyword}' must be a string"))
            })?;
            catalog.insert(keyword.clone(), template.to_string());
        }
        engine.add_localizer(Arc::new(CatalogLocalizer::new(catalog)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scp_engine::{create_engine, EngineMode, EngineOptions};
    use serde_json::json;

    struct Named(&'static str);

    impl EnginePlugin for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn apply(&self, _: &mut dyn SchemaEngine, config: Option<&Value>) -> Result<(), EngineError> {
            match config {
                Some(Value::Bool(false)) => Err(EngineError::Configuration("refused".into())),
                _ => Ok(()),
            }
        }
    }

    #[test]
    fn test_adapter_reports_in_order() {
        let mut engine = create_engine(EngineMode::Standard, EngineOptions::default(), None);
        let plugins = vec![
            PluginEntry::new(Arc::new(Named("b"))),
            PluginEntry::new(Arc::new(Named("a"))),
        ];
        let report = PluginAdapter::apply(engine.as_mut(), &plugins).unwrap();
        assert_eq!(report.applied, ["b", "a"]);
        assert!(report.contains("a"));
        assert!(!report.contains(FORMATS_PLUGIN));
    }

    #[test]
    fn test_adapter_names_failing_plugin() {
        let mut engine = create_engine(EngineMode::Standard, EngineOptions::default(), None);
        let plugins = vec![PluginEntry::new(Arc::new(Named("picky"))).with_config(json!(false))];
        match PluginAdapter::apply(engine.as_mut(), &plugins) {
            Err(CompilerError::Plugin { name, reason }) => {
                assert_eq!(name, "picky");
                assert!(reason.contains("refused"));
            }
            other => panic!("expected plugin error, got {other:?}"),
        }
    }

    #[test]
    fn test_formats_plugin_registers_regex_formats() {
        let mut engine = create_engine(EngineMode::Standard, EngineOptions::default(), None);
        FormatsPlugin
            .apply(engine.as_mut(), Some(&json!({"formats": {"ticket": "^T-[0-9]+$"}})))
            .unwrap();
        assert!(engine.format_assertion());
        let v = engine.compile(&json!({"type": "string", "format": "ticket"})).unwrap();
        assert!(v.is_valid(&mut json!("T-42")));
        assert!(!v.is_valid(&mut json!("T-x")));
    }

    #[test]
    fn test_formats_plugin_regex_is_unanchored() {
        let mut engine = create_engine(EngineMode::Standard, EngineOptions::default(), None);
        FormatsPlugin
            .apply(engine.as_mut(), Some(&json!({"formats": {"loose": "T-[0-9]+"}})))
            .unwrap();
        let v = engine.compile(&json!({"type": "string", "format": "loose"})).unwrap();
        assert!(v.is_valid(&mut json!("xT-1y")));
        assert!(!v.is_valid(&mut json!("T-")));
    }

    #[test]
    fn test_formats_plugin_rejects_bad_regex() {
        let mut engine = create_engine(EngineMode::Standard, EngineOptions::default(), None);
        let err = FormatsPlugin
            .apply(engine.as_mut(), Some(&json!({"formats": {"bad": "("}})))
            .unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn test_localize_plugin_rejects_non_string_templates() {
        let mut engine = create_engine(EngineMode::Standard, EngineOptions::default(), None);
        let err = LocalizePlugin
            .apply(engine.as_mut(), Some(&json!({"messages": {"type": 3}})))
            .unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }
}
