//! # Plugin Application
//!
//! Plugins run in order, once per engine, before `on_create`. A caller
//! plugin named `formats` replaces the default one; JTD compilers get no
//! default formats plugin at all.

use std::sync::Arc;

use parking_lot::Mutex;
use scp_compiler::{
    CompilerError, CompilerOptions, CompilerPool, EnginePlugin, ErrorMessagePlugin, FormatsPlugin,
    LocalizePlugin, FORMATS_PLUGIN,
};
use scp_core::{ExternalSchemaMap, HttpPart, RouteSchemaDescriptor};
use scp_engine::{EngineError, EngineMode, SchemaEngine};
use serde_json::{json, Value};

/// Records every application into a shared log.
struct Recorder {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl EnginePlugin for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    fn apply(&self, _engine: &mut dyn SchemaEngine, config: Option<&Value>) -> Result<(), EngineError> {
        let entry = match config {
            Some(c) => format!("{}:{c}", self.name),
            None => self.name.to_string(),
        };
        self.log.lock().push(entry);
        Ok(())
    }
}

/// Adds an `even` keyword.
struct EvenKeyword;

impl EnginePlugin for EvenKeyword {
    fn name(&self) -> &str {
        "even"
    }

    fn apply(&self, engine: &mut dyn SchemaEngine, _config: Option<&Value>) -> Result<(), EngineError> {
        engine.add_keyword(
            "even",
            Arc::new(|wanted: &Value, instance: &Value| {
                let is_even = instance.as_i64().map(|n| n % 2 == 0);
                match (wanted.as_bool(), is_even) {
                    (Some(true), Some(false)) => Err("must be even".to_string()),
                    _ => Ok(()),
                }
            }),
        )
    }
}

fn route(schema: Value) -> RouteSchemaDescriptor {
    RouteSchemaDescriptor::new("GET", "/:id", HttpPart::Headers, schema)
}

fn headers_schema() -> Value {
    json!({
        "type": "object",
        "required": ["x-foo", "x-date", "x-email"],
        "properties": {
            "x-foo": {"type": "string"},
            "x-date": {"type": "string", "format": "date-time"},
            "x-email": {"type": "string", "format": "email"}
        }
    })
}

#[test]
fn plugins_apply_in_order_with_config() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let opts = CompilerOptions::default()
        .with_plugin(Recorder { name: "first", log: Arc::clone(&log) })
        .with_plugin_config(Recorder { name: "second", log: Arc::clone(&log) }, json!({"level": 2}));
    let pool = CompilerPool::validators();
    let compiler = pool.build_compiler(&ExternalSchemaMap::new(), &opts).unwrap();
    pool.build_compiler(&ExternalSchemaMap::new(), &opts).unwrap();

    assert_eq!(*log.lock(), vec!["first".to_string(), r#"second:{"level":2}"#.to_string()]);
    assert_eq!(compiler.applied_plugins(), ["first", "second", FORMATS_PLUGIN]);
}

#[test]
fn plugin_config_is_part_of_the_key() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let one = CompilerOptions::default()
        .with_plugin_config(Recorder { name: "p", log: Arc::clone(&log) }, json!(1));
    let two = CompilerOptions::default()
        .with_plugin_config(Recorder { name: "p", log: Arc::clone(&log) }, json!(2));
    let pool = CompilerPool::validators();
    let a = pool.build_compiler(&ExternalSchemaMap::new(), &one).unwrap();
    let b = pool.build_compiler(&ExternalSchemaMap::new(), &two).unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
}

#[test]
fn caller_formats_plugin_replaces_default() {
    let opts = CompilerOptions::default()
        .with_plugin_config(FormatsPlugin, json!({"formats": {"ticket": "^T-[0-9]+$"}}));
    let compiler = CompilerPool::validators()
        .build_compiler(&ExternalSchemaMap::new(), &opts)
        .unwrap();
    assert_eq!(compiler.applied_plugins(), [FORMATS_PLUGIN]);
    let validator = compiler
        .compile_route(&route(json!({"type": "string", "format": "ticket"})))
        .unwrap();
    assert!(validator.is_valid(&mut json!("T-1")));
    assert!(!validator.is_valid(&mut json!("ticket")));
}

#[test]
fn format_assertion_follows_validate_formats() {
    let pool = CompilerPool::validators();
    let headers = json!({"x-foo": "hello", "x-date": "not a date", "x-email": "not an email"});

    let relaxed = CompilerOptions::default().with_option("validateFormats", json!(false));
    let validator = pool
        .build_compiler(&ExternalSchemaMap::new(), &relaxed)
        .unwrap()
        .compile_route(&route(headers_schema()))
        .unwrap();
    assert!(validator.is_valid(&mut headers.clone()));

    let strict = CompilerOptions::default().with_option("allErrors", json!(true));
    let validator = pool
        .build_compiler(&ExternalSchemaMap::new(), &strict)
        .unwrap()
        .compile_route(&route(headers_schema()))
        .unwrap();
    let failure = validator.validate(&mut headers.clone()).unwrap_err();
    assert_eq!(failure.errors.len(), 2);
    assert!(failure.errors.iter().all(|i| i.keyword == "format"));
    assert!(validator.is_valid(&mut json!({
        "x-foo": "hello",
        "x-date": "2024-05-01T10:00:00Z",
        "x-email": "foo@bar.baz"
    })));
}

#[test]
fn jtd_rejects_format_config() {
    let opts = CompilerOptions::new(EngineMode::Jtd)
        .with_plugin_config(FormatsPlugin, json!({"formats": {"x": "."}}));
    let err = CompilerPool::validators()
        .build_compiler(&ExternalSchemaMap::new(), &opts)
        .unwrap_err();
    assert!(matches!(err, CompilerError::Plugin { ref name, .. } if name == FORMATS_PLUGIN));
}

#[test]
fn custom_keyword_from_plugin() {
    let opts = CompilerOptions::default().with_plugin(EvenKeyword);
    let compiler = CompilerPool::validators()
        .build_compiler(&ExternalSchemaMap::new(), &opts)
        .unwrap();
    let validator = compiler
        .compile_route(&route(json!({
            "type": "object",
            "properties": {"n": {"type": "integer", "even": true}}
        })))
        .unwrap();
    assert!(validator.is_valid(&mut json!({"n": "4"})));
    let failure = validator.validate(&mut json!({"n": 3})).unwrap_err();
    assert_eq!(failure.errors[0].keyword, "even");
    assert_eq!(failure.errors[0].instance_path, "/n");
}

#[test]
fn error_message_and_localize_plugins() {
    let opts = CompilerOptions::default()
        .with_plugin(ErrorMessagePlugin)
        .with_plugin_config(
            LocalizePlugin,
            json!({"messages": {"type": "{instancePath} ha de ser {type}"}}),
        );
    let compiler = CompilerPool::validators()
        .build_compiler(&ExternalSchemaMap::new(), &opts)
        .unwrap();
    let validator = compiler
        .compile_route(&route(json!({
            "type": "object",
            "properties": {
                "age": {"type": "integer", "errorMessage": "age is a whole number"},
                "tags": {"type": "object"}
            }
        })))
        .unwrap();

    // Localizers run in plugin order, so the catalog rewrites last.
    let failure = validator.validate(&mut json!({"tags": 1})).unwrap_err();
    assert_eq!(failure.errors[0].message, "/tags ha de ser object");

    let only_error_message = CompilerOptions::default().with_plugin(ErrorMessagePlugin);
    let validator = CompilerPool::validators()
        .build_compiler(&ExternalSchemaMap::new(), &only_error_message)
        .unwrap()
        .compile_route(&route(json!({
            "type": "object",
            "properties": {"age": {"type": "integer", "errorMessage": "age is a whole number"}}
        })))
        .unwrap();
    let failure = validator.validate(&mut json!({"age": "old"})).unwrap_err();
    assert_eq!(failure.errors[0].message, "age is a whole number");
}
