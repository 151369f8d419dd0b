//! RFC 8927 validation over a well-formed schema.

use chrono::DateTime;
use serde_json::{Map, Value};

use crate::artifact::ValidationIssue;
use crate::draft::escape_segment;

/// Recursion limit for `ref` chains.
const MAX_DEPTH: usize = 64;

pub(crate) struct JtdValidator {
    root: Value,
    all_errors: bool,
}

/// Walk state shared by every level of one validation.
struct Walk<'s> {
    definitions: Option<&'s Map<String, Value>>,
    all_errors: bool,
    issues: Vec<ValidationIssue>,
}

impl Walk<'_> {
    fn done(&self) -> bool {
        !self.all_errors && !self.issues.is_empty()
    }

    fn report(
        &mut self,
        keyword: &str,
        instance_path: &str,
        schema_path: &str,
        message: impl Into<String>,
    ) {
        if self.done() {
            return;
        }
        self.issues.push(ValidationIssue::new(
            keyword,
            instance_path,
            format!("#{schema_path}"),
            message,
        ));
    }
}

impl JtdValidator {
    pub(crate) fn new(root: Value, all_errors: bool) -> Self {
        Self { root, all_errors }
    }

    pub(crate) fn validate(&self, instance: &Value) -> Vec<ValidationIssue> {
        let mut walk = Walk {
            definitions: self.root.get("definitions").and_then(Value::as_object),
            all_errors: self.all_errors,
            issues: Vec::new(),
        };
        check(&mut walk, &self.root, instance, "", "", None, 0);
        walk.issues
    }
}

fn check<'s>(
    walk: &mut Walk<'s>,
    schema: &'s Value,
    instance: &Value,
    ipath: &str,
    spath: &str,
    exempt_tag: Option<&str>,
    depth: usize,
) {
    if walk.done() || depth > MAX_DEPTH {
        return;
    }
    let Some(obj) = schema.as_object() else {
        return;
    };
    if instance.is_null() && obj.get("nullable") == Some(&Value::Bool(true)) {
        return;
    }

    if let Some(name) = obj.get("ref").and_then(Value::as_str) {
        if let Some(target) = walk.definitions.and_then(|d| d.get(name)) {
            let next = format!("/definitions/{}", escape_segment(name));
            check(walk, target, instance, ipath, &next, None, depth + 1);
        }
        return;
    }

    if let Some(ty) = obj.get("type").and_then(Value::as_str) {
        if !matches_jtd_type(instance, ty) {
            walk.report("type", ipath, &format!("{spath}/type"), format!("must be {ty}"));
        }
        return;
    }

    if let Some(values) = obj.get("enum").and_then(Value::as_array) {
        let known = instance
            .as_str()
            .is_some_and(|s| values.iter().any(|v| v.as_str() == Some(s)));
        if !known {
            walk.report(
                "enum",
                ipath,
                &format!("{spath}/enum"),
                "must be equal to one of the allowed values",
            );
        }
        return;
    }

    if let Some(elements) = obj.get("elements") {
        let Some(items) = instance.as_array() else {
            walk.report("elements", ipath, &format!("{spath}/elements"), "must be array");
            return;
        };
        let next_spath = format!("{spath}/elements");
        for (i, item) in items.iter().enumerate() {
            check(walk, elements, item, &format!("{ipath}/{i}"), &next_spath, None, depth + 1);
        }
        return;
    }

    if obj.contains_key("properties") || obj.contains_key("optionalProperties") {
        check_properties(walk, obj, instance, ipath, spath, exempt_tag, depth);
        return;
    }

    if let Some(values) = obj.get("values") {
        let Some(map) = instance.as_object() else {
            walk.report("values", ipath, &format!("{spath}/values"), "must be object");
            return;
        };
        let next_spath = format!("{spath}/values");
        for (key, v) in map {
            let next = format!("{ipath}/{}", escape_segment(key));
            check(walk, values, v, &next, &next_spath, None, depth + 1);
        }
        return;
    }

    if let Some(tag) = obj.get("discriminator").and_then(Value::as_str) {
        let Some(map) = instance.as_object() else {
            walk.report("discriminator", ipath, &format!("{spath}/discriminator"), "must be object");
            return;
        };
        let tag_path = format!("{ipath}/{}", escape_segment(tag));
        match map.get(tag) {
            None => walk.report(
                "discriminator",
                ipath,
                &format!("{spath}/discriminator"),
                format!("must have property '{tag}'"),
            ),
            Some(Value::String(variant)) => {
                let mapping = obj.get("mapping").and_then(Value::as_object);
                match mapping.and_then(|m| m.get(variant)) {
                    Some(variant_schema) => {
                        let next = format!("{spath}/mapping/{}", escape_segment(variant));
                        check(walk, variant_schema, instance, ipath, &next, Some(tag), depth + 1);
                    }
                    None => walk.report(
                        "mapping",
                        &tag_path,
                        &format!("{spath}/mapping"),
                        format!("tag \"{tag}\" must be one of the mapping values"),
                    ),
                }
            }
            Some(_) => walk.report(
                "discriminator",
                &tag_path,
                &format!("{spath}/discriminator"),
                format!("tag \"{tag}\" must be string"),
            ),
        }
    }
}

fn check_properties<'s>(
    walk: &mut Walk<'s>,
    obj: &'s Map<String, Value>,
    instance: &Value,
    ipath: &str,
    spath: &str,
    exempt_tag: Option<&str>,
    depth: usize,
) {
    let required = obj.get("properties").and_then(Value::as_object);
    let optional = obj.get("optionalProperties").and_then(Value::as_object);
    let Some(map) = instance.as_object() else {
        let keyword = if required.is_some() { "properties" } else { "optionalProperties" };
        walk.report(keyword, ipath, &format!("{spath}/{keyword}"), "must be object");
        return;
    };

    if let Some(required) = required {
        for (key, sub) in required {
            let sub_spath = format!("{spath}/properties/{}", escape_segment(key));
            match map.get(key) {
                Some(v) => {
                    let next = format!("{ipath}/{}", escape_segment(key));
                    check(walk, sub, v, &next, &sub_spath, None, depth + 1);
                }
                None => walk.report(
                    "properties",
                    ipath,
                    &sub_spath,
                    format!("must have property '{key}'"),
                ),
            }
        }
    }
    if let Some(optional) = optional {
        for (key, sub) in optional {
            if let Some(v) = map.get(key) {
                let next = format!("{ipath}/{}", escape_segment(key));
                let sub_spath = format!("{spath}/optionalProperties/{}", escape_segment(key));
                check(walk, sub, v, &next, &sub_spath, None, depth + 1);
            }
        }
    }

    if obj.get("additionalProperties") == Some(&Value::Bool(true)) {
        return;
    }
    for key in map.keys() {
        let declared = required.is_some_and(|p| p.contains_key(key))
            || optional.is_some_and(|p| p.contains_key(key))
            || exempt_tag == Some(key.as_str());
        if !declared {
            walk.report(
                "additionalProperties",
                &format!("{ipath}/{}", escape_segment(key)),
                spath,
                "must NOT have additional properties",
            );
        }
    }
}

fn matches_jtd_type(instance: &Value, ty: &str) -> bool {
    match ty {
        "boolean" => instance.is_boolean(),
        "string" => instance.is_string(),
        "timestamp" => instance
            .as_str()
            .is_some_and(|s| DateTime::parse_from_rfc3339(s).is_ok()),
        "float32" | "float64" => instance.is_number(),
        "int8" => in_int_range(instance, -128.0, 127.0),
        "uint8" => in_int_range(instance, 0.0, 255.0),
        "int16" => in_int_range(instance, -32_768.0, 32_767.0),
        "uint16" => in_int_range(instance, 0.0, 65_535.0),
        "int32" => in_int_range(instance, -2_147_483_648.0, 2_147_483_647.0),
        "uint32" => in_int_range(instance, 0.0, 4_294_967_295.0),
        _ => false,
    }
}

/// Integer-valued number (fractional part zero) within `[min, max]`.
fn in_int_range(instance: &Value, min: f64, max: f64) -> bool {
    instance
        .as_f64()
        .is_some_and(|f| f.fract() == 0.0 && f >= min && f <= max)
}
