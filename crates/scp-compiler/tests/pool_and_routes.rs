//! # Pool Memoization and Route Compilation
//!
//! Covers the compiler pool key (which configurations share an engine) and
//! the per-route compile protocol end to end: coercion, defaults,
//! stripping, error breadth, duplicate `$id` short-circuit, and JTD.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use proptest::prelude::*;
use scp_compiler::{CompilerError, CompilerOptions, CompilerPool};
use scp_core::{ExternalSchemaMap, HttpPart, RouteSchemaDescriptor};
use scp_engine::EngineMode;
use serde_json::{json, Value};

fn route(part: HttpPart, schema: Value) -> RouteSchemaDescriptor {
    RouteSchemaDescriptor::new("POST", "/foo", part, schema)
}

fn shared_schemas() -> ExternalSchemaMap {
    let mut map = ExternalSchemaMap::new();
    map.insert(
        "urn:schema:base".into(),
        json!({
            "$id": "urn:schema:base",
            "definitions": {"hello": {"type": "string"}},
            "type": "object",
            "properties": {"hello": {"$ref": "#/definitions/hello"}}
        }),
    );
    map.insert(
        "urn:schema:ref".into(),
        json!({
            "$id": "urn:schema:ref",
            "type": "object",
            "properties": {"hello": {"$ref": "urn:schema:base#/definitions/hello"}}
        }),
    );
    map
}

// =========================================================================
// Pool keys
// =========================================================================

#[test]
fn equal_configurations_share_one_compiler() {
    let pool = CompilerPool::validators();
    let opts = CompilerOptions::default().with_custom_options(json!({"allErrors": false}));
    let first = pool.build_compiler(&shared_schemas(), &opts).unwrap();
    let second = pool.build_compiler(&shared_schemas(), &opts).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(pool.len(), 1);
}

#[test]
fn differing_configurations_get_distinct_compilers() {
    let pool = CompilerPool::validators();
    let base = pool
        .build_compiler(&shared_schemas(), &CompilerOptions::default())
        .unwrap();

    let other_options = CompilerOptions::default().with_option("allErrors", json!(true));
    let by_options = pool.build_compiler(&shared_schemas(), &other_options).unwrap();
    assert!(!Arc::ptr_eq(&base, &by_options));

    let mut fewer = shared_schemas();
    fewer.remove("urn:schema:ref");
    let by_schemas = pool.build_compiler(&fewer, &CompilerOptions::default()).unwrap();
    assert!(!Arc::ptr_eq(&base, &by_schemas));

    let by_mode = pool
        .build_compiler(&ExternalSchemaMap::new(), &CompilerOptions::new(EngineMode::Draft2020_12))
        .unwrap();
    let by_mode_std = pool
        .build_compiler(&ExternalSchemaMap::new(), &CompilerOptions::default())
        .unwrap();
    assert!(!Arc::ptr_eq(&by_mode, &by_mode_std));
    assert_eq!(pool.len(), 5);
}

#[test]
fn on_create_runs_once_per_engine() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let opts = CompilerOptions::default().with_on_create(move |engine| {
        assert!(engine.format_assertion(), "plugins run before on_create");
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    let pool = CompilerPool::validators();
    for _ in 0..3 {
        pool.build_compiler(&shared_schemas(), &opts).unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn concurrent_builds_construct_one_engine() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let opts = CompilerOptions::default().with_on_create(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    let pool = Arc::new(CompilerPool::validators());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let opts = opts.clone();
            std::thread::spawn(move || pool.build_compiler(&shared_schemas(), &opts).unwrap())
        })
        .collect();
    let compilers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(compilers.iter().all(|c| Arc::ptr_eq(c, &compilers[0])));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn unknown_custom_option_values_fail_construction() {
    let pool = CompilerPool::validators();
    let opts = CompilerOptions::default().with_option("removeAdditional", json!("sometimes"));
    assert!(matches!(
        pool.build_compiler(&ExternalSchemaMap::new(), &opts),
        Err(CompilerError::Configuration(_))
    ));
    assert!(pool.is_empty());
}

proptest! {
    #[test]
    fn fingerprint_ignores_insertion_order(
        entries in proptest::collection::btree_map("[a-z]{1,6}", -1000i64..1000, 0..8)
    ) {
        let forward: serde_json::Map<String, Value> =
            entries.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
        let mut backward = serde_json::Map::new();
        for (k, v) in entries.iter().rev() {
            backward.insert(k.clone(), json!(v));
        }
        let one = CompilerOptions::default().with_custom_options(Value::Object(forward));
        let two = CompilerOptions::default().with_custom_options(Value::Object(backward));
        let external = shared_schemas();
        prop_assert_eq!(
            CompilerPool::fingerprint(&external, &one).unwrap(),
            CompilerPool::fingerprint(&external, &two).unwrap()
        );
    }
}

// =========================================================================
// Route compilation
// =========================================================================

#[test]
fn same_id_compiled_twice_is_the_same_artifact() {
    let pool = CompilerPool::validators();
    let compiler = pool
        .build_compiler(&ExternalSchemaMap::new(), &CompilerOptions::default())
        .unwrap();
    let schema = json!({"$id": "urn:schema:x", "type": "object"});
    let first = compiler.compile_route(&route(HttpPart::Body, schema.clone())).unwrap();
    let second = compiler.compile_route(&route(HttpPart::Body, schema)).unwrap();
    assert!(first.ptr_eq(&second));
}

#[test]
fn external_id_inline_does_not_fail() {
    let pool = CompilerPool::validators();
    let compiler = pool
        .build_compiler(&shared_schemas(), &CompilerOptions::default())
        .unwrap();
    let first = compiler
        .compile_route(&route(HttpPart::Body, json!({"$id": "urn:schema:ref"})))
        .unwrap();
    let second = compiler
        .compile_route(&route(HttpPart::Body, json!({"$id": "urn:schema:ref"})))
        .unwrap();
    assert!(first.ptr_eq(&second));
    assert!(first.is_valid(&mut json!({"hello": "world"})));
}

#[test]
fn simple_object_validates() {
    let pool = CompilerPool::validators();
    let compiler = pool
        .build_compiler(&ExternalSchemaMap::new(), &CompilerOptions::default())
        .unwrap();
    let validator = compiler
        .compile_route(&route(
            HttpPart::Body,
            json!({"type": "object", "properties": {"name": {"type": "string"}}}),
        ))
        .unwrap();
    assert!(validator.is_valid(&mut json!({"name": "hello"})));
}

#[test]
fn scalar_promoted_to_array() {
    let pool = CompilerPool::validators();
    let compiler = pool
        .build_compiler(&ExternalSchemaMap::new(), &CompilerOptions::default())
        .unwrap();
    let validator = compiler
        .compile_route(&route(
            HttpPart::Querystring,
            json!({
                "type": "object",
                "properties": {"name": {"type": "array", "items": {"type": "string"}}}
            }),
        ))
        .unwrap();
    let mut query = json!({"name": "hello"});
    assert!(validator.validate(&mut query).is_ok());
    assert_eq!(query, json!({"name": ["hello"]}));
}

#[test]
fn first_failure_only_unless_all_errors() {
    let schema = json!({
        "type": "object",
        "properties": {"a": {"type": "integer"}, "b": {"type": "integer"}}
    });
    let pool = CompilerPool::validators();

    let compiler = pool
        .build_compiler(&ExternalSchemaMap::new(), &CompilerOptions::default())
        .unwrap();
    let validator = compiler.compile_route(&route(HttpPart::Body, schema.clone())).unwrap();
    let failure = validator.validate(&mut json!({"a": "x", "b": "y"})).unwrap_err();
    assert_eq!(failure.errors.len(), 1);
    assert_eq!(failure.errors[0].keyword, "type");

    let exhaustive = CompilerOptions::default().with_option("allErrors", json!(true));
    let compiler = pool.build_compiler(&ExternalSchemaMap::new(), &exhaustive).unwrap();
    let validator = compiler.compile_route(&route(HttpPart::Body, schema)).unwrap();
    let failure = validator.validate(&mut json!({"a": "x", "b": "y"})).unwrap_err();
    assert_eq!(failure.errors.len(), 2);
}

#[test]
fn defaults_stripping_and_nullable() {
    let pool = CompilerPool::validators();
    let compiler = pool
        .build_compiler(&ExternalSchemaMap::new(), &CompilerOptions::default())
        .unwrap();
    let validator = compiler
        .compile_route(&route(
            HttpPart::Body,
            json!({
                "type": "object",
                "properties": {
                    "limit": {"type": "integer", "default": 10},
                    "note": {"type": "string", "nullable": true}
                },
                "additionalProperties": false
            }),
        ))
        .unwrap();
    let mut body = json!({"note": null, "admin": true});
    assert!(validator.validate(&mut body).is_ok());
    assert_eq!(body, json!({"limit": 10, "note": null}));
}

#[test]
fn jtd_routes_validate_and_serialize() {
    let schema = json!({
        "discriminator": "kind",
        "mapping": {
            "user": {"properties": {"age": {"type": "uint8"}, "joined": {"type": "timestamp"}}}
        }
    });
    let options = CompilerOptions::new(EngineMode::Jtd);

    let validators = CompilerPool::validators();
    let compiler = validators.build_compiler(&ExternalSchemaMap::new(), &options).unwrap();
    assert!(compiler.applied_plugins().is_empty());
    let validator = compiler.compile_route(&route(HttpPart::Body, schema.clone())).unwrap();
    assert!(validator.is_valid(&mut json!({"kind": "user", "age": 30, "joined": "2024-01-01T00:00:00Z"})));
    assert!(!validator.is_valid(&mut json!({"kind": "user", "age": 300, "joined": "2024-01-01T00:00:00Z"})));
    assert!(!validator.is_valid(&mut json!({"kind": "user", "age": 3, "joined": "yesterday"})));

    let serializers = CompilerPool::serializers();
    let compiler = serializers.build_compiler(&ExternalSchemaMap::new(), &options).unwrap();
    let serializer = compiler
        .compile_route(&route(HttpPart::Body, schema).with_http_status("200"))
        .unwrap();
    assert_eq!(
        serializer.serialize(&json!({"age": 3, "kind": "user", "joined": "2024-01-01T00:00:00Z", "pw": "x"})),
        r#"{"kind":"user","age":3,"joined":"2024-01-01T00:00:00Z"}"#
    );
}

#[test]
fn invalid_schema_fails_route_registration() {
    let pool = CompilerPool::validators();
    let compiler = pool
        .build_compiler(&ExternalSchemaMap::new(), &CompilerOptions::default())
        .unwrap();
    let err = compiler
        .compile_route(&route(HttpPart::Params, json!({"type": 12})))
        .unwrap_err();
    assert!(matches!(
        err,
        CompilerError::SchemaCompile { http_part: HttpPart::Params, .. }
    ));
}
