//! Integration test: one request-shaped payload through every engine mode.
//!
//! Checks that each draft applies its own vocabulary (`items` arrays in
//! draft-07, `prefixItems` in 2020-12), that shaping happens before
//! validation in every draft, and that JTD reports RFC 8927 paths.

use scp_engine::{create_engine, ArtifactKind, EngineError, EngineMode, EngineOptions};
use serde_json::{json, Value};

fn options(custom: Value) -> EngineOptions {
    EngineOptions::resolve(custom.as_object().expect("object")).expect("valid options")
}

#[test]
fn test_querystring_coercion_in_every_draft() {
    let schema = json!({
        "type": "object",
        "properties": {
            "page": {"type": "integer", "minimum": 1, "default": 1},
            "ids": {"type": "array", "items": {"type": "integer"}},
            "verbose": {"type": "boolean"}
        },
        "additionalProperties": false
    });
    for mode in [
        EngineMode::Standard,
        EngineMode::Draft2019_09,
        EngineMode::Draft2020_12,
    ] {
        let engine = create_engine(mode, EngineOptions::default(), None);
        let validator = engine.compile(&schema).unwrap();
        let mut query = json!({"ids": "7", "verbose": "true", "utm_source": "mail"});
        assert!(validator.validate(&mut query).is_ok(), "mode {mode}");
        assert_eq!(
            query,
            json!({"page": 1, "ids": [7], "verbose": true}),
            "mode {mode}"
        );
    }
}

#[test]
fn test_tuple_vocabulary_per_draft() {
    let draft7 = create_engine(EngineMode::Standard, EngineOptions::default(), None);
    let v = draft7
        .compile(&json!({"type": "array", "items": [{"type": "integer"}, {"type": "string"}]}))
        .unwrap();
    let mut pair = json!(["1", 2]);
    assert!(v.validate(&mut pair).is_ok());
    assert_eq!(pair, json!([1, "2"]));

    let draft2020 = create_engine(EngineMode::Draft2020_12, EngineOptions::default(), None);
    let v = draft2020
        .compile(&json!({"type": "array", "prefixItems": [{"type": "integer"}], "items": false}))
        .unwrap();
    let mut single = json!(["5"]);
    assert!(v.validate(&mut single).is_ok());
    assert_eq!(single, json!([5]));
    assert!(v.validate(&mut json!([1, 2])).is_err());
}

#[test]
fn test_jtd_reports_rfc_paths() {
    let engine = create_engine(EngineMode::Jtd, options(json!({"allErrors": true})), None);
    let v = engine
        .compile(&json!({
            "properties": {"age": {"type": "uint8"}, "born": {"type": "timestamp"}}
        }))
        .unwrap();
    let err = v
        .validate(&mut json!({"age": 256, "born": "yesterday"}))
        .unwrap_err();
    let mut paths: Vec<(String, String)> = err
        .errors
        .iter()
        .map(|i| (i.instance_path.clone(), i.schema_path.clone()))
        .collect();
    paths.sort();
    assert_eq!(
        paths,
        vec![
            ("/age".to_string(), "#/properties/age/type".to_string()),
            ("/born".to_string(), "#/properties/born/type".to_string()),
        ]
    );
}

#[test]
fn test_get_schema_kinds_are_independent() {
    let mut engine = create_engine(EngineMode::Standard, EngineOptions::default(), None);
    engine
        .add_schema("urn:user", json!({"$id": "urn:user", "type": "object", "properties": {"n": {"type": "string"}}}))
        .unwrap();
    let validator = engine.get_schema("urn:user", ArtifactKind::Validator).unwrap().unwrap();
    let serializer = engine.get_schema("urn:user", ArtifactKind::Serializer).unwrap().unwrap();
    assert_eq!(validator.kind(), ArtifactKind::Validator);
    assert_eq!(serializer.kind(), ArtifactKind::Serializer);
    assert!(!validator.ptr_eq(&serializer));
    assert_eq!(serializer.serialize(&json!({"n": 1, "x": 2})), r#"{"n":"1"}"#);
}

#[test]
fn test_add_schema_rejects_duplicate_ids() {
    let mut engine = create_engine(EngineMode::Standard, EngineOptions::default(), None);
    engine.add_schema("a", json!({"$id": "urn:a"})).unwrap();
    assert!(matches!(
        engine.add_schema("b", json!({"$id": "urn:a"})),
        Err(EngineError::DuplicateId(_))
    ));
}
