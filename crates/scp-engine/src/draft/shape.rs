//! Payload shaping: coercion, defaults, removal of undeclared properties,
//! and custom keywords.
//!
//! The walk follows `$ref`, `allOf`, `properties`, `patternProperties`,
//! `additionalProperties`, `items`, `prefixItems` and `additionalItems`.
//! Branching keywords (`anyOf`, `oneOf`, `if`) are not entered: which
//! branch applies is only known after validation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Number, Value};

use super::{escape_segment, PatternCache, SchemaSet, MAX_DEPTH};
use crate::artifact::ValidationIssue;
use crate::extension::KeywordCheck;
use crate::options::{CoerceTypes, EngineOptions, RemoveAdditional, UseDefaults};

/// Where the walk is: a payload pointer and a schema pointer.
#[derive(Clone)]
struct Location {
    instance: String,
    schema: String,
}

impl Location {
    fn root() -> Self {
        Self {
            instance: String::new(),
            schema: String::new(),
        }
    }

    fn schema(&self, segments: &[&str]) -> Self {
        let mut schema = self.schema.clone();
        for segment in segments {
            schema.push('/');
            schema.push_str(&escape_segment(segment));
        }
        Self {
            instance: self.instance.clone(),
            schema,
        }
    }

    fn child(&self, key: &str, segments: &[&str]) -> Self {
        let mut next = self.schema(segments);
        next.instance.push('/');
        next.instance.push_str(&escape_segment(key));
        next
    }
}

pub(crate) struct Shaper {
    set: SchemaSet,
    coerce: CoerceTypes,
    use_defaults: UseDefaults,
    remove_additional: RemoveAdditional,
    keywords: Vec<(String, Arc<dyn KeywordCheck>)>,
    patterns: PatternCache,
    additional: Mutex<HashMap<String, Option<Arc<jsonschema::Validator>>>>,
}

impl Shaper {
    pub(crate) fn new(
        set: SchemaSet,
        options: &EngineOptions,
        keywords: Vec<(String, Arc<dyn KeywordCheck>)>,
    ) -> Self {
        Self {
            set,
            coerce: options.coerce_types,
            use_defaults: options.use_defaults,
            remove_additional: options.remove_additional,
            keywords,
            patterns: PatternCache::default(),
            additional: Mutex::new(HashMap::new()),
        }
    }

    /// Shape `value` in place. Returns the custom keyword issues found.
    pub(crate) fn shape(&self, value: &mut Value) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let root = self.set.root();
        self.walk(root, root, value, &Location::root(), 0, &mut issues);
        issues
    }

    fn walk(
        &self,
        schema: &Value,
        doc: &Value,
        value: &mut Value,
        at: &Location,
        depth: usize,
        issues: &mut Vec<ValidationIssue>,
    ) {
        if depth > MAX_DEPTH {
            return;
        }
        let Some(obj) = schema.as_object() else {
            return;
        };

        if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
            if let Some((target, target_doc)) = self.set.resolve(reference, doc) {
                self.walk(target, target_doc, value, &at.schema(&["$ref"]), depth + 1, issues);
            }
        }

        if self.coerce != CoerceTypes::Off {
            if let Some(types) = obj.get("type") {
                coerce(value, &type_names(types), self.coerce);
            }
        }

        if let Some(Value::Array(subschemas)) = obj.get("allOf") {
            for (i, sub) in subschemas.iter().enumerate() {
                let index = i.to_string();
                self.walk(sub, doc, value, &at.schema(&["allOf", &index]), depth + 1, issues);
            }
        }

        if value.is_object() {
            self.shape_object(obj, doc, value, at, depth, issues);
        } else if value.is_array() {
            self.shape_array(obj, doc, value, at, depth, issues);
        }

        for (name, check) in &self.keywords {
            if let Some(keyword_value) = obj.get(name) {
                if let Err(message) = check.check(keyword_value, value) {
                    issues.push(ValidationIssue::new(
                        name.clone(),
                        at.instance.clone(),
                        format!("#{}", at.schema(&[name]).schema),
                        message,
                    ));
                }
            }
        }
    }

    fn shape_object(
        &self,
        obj: &Map<String, Value>,
        doc: &Value,
        value: &mut Value,
        at: &Location,
        depth: usize,
        issues: &mut Vec<ValidationIssue>,
    ) {
        let Some(map) = value.as_object_mut() else {
            return;
        };
        let properties = obj.get("properties").and_then(Value::as_object);
        let patterns = obj.get("patternProperties").and_then(Value::as_object);

        if let Some(props) = properties {
            if self.use_defaults != UseDefaults::Off {
                for (key, sub) in props {
                    let Some(default) = sub.get("default") else {
                        continue;
                    };
                    let fill = match map.get(key) {
                        None => true,
                        Some(existing) => {
                            self.use_defaults == UseDefaults::Empty && is_empty_value(existing)
                        }
                    };
                    if fill {
                        map.insert(key.clone(), default.clone());
                    }
                }
            }
            for (key, sub) in props {
                if let Some(child) = map.get_mut(key) {
                    let next = at.child(key, &["properties", key]);
                    self.walk(sub, doc, child, &next, depth + 1, issues);
                }
            }
        }

        if let Some(patterns) = patterns {
            let keys: Vec<String> = map.keys().cloned().collect();
            for key in &keys {
                for (pattern, sub) in patterns {
                    if !self.patterns.is_match(pattern, key) {
                        continue;
                    }
                    if let Some(child) = map.get_mut(key) {
                        let next = at.child(key, &["patternProperties", pattern]);
                        self.walk(sub, doc, child, &next, depth + 1, issues);
                    }
                }
            }
        }

        let undeclared: Vec<String> = map
            .keys()
            .filter(|key| {
                !properties.is_some_and(|p| p.contains_key(key.as_str()))
                    && !patterns.is_some_and(|p| {
                        p.keys().any(|pattern| self.patterns.is_match(pattern, key))
                    })
            })
            .cloned()
            .collect();
        if undeclared.is_empty() {
            return;
        }

        let additional = obj.get("additionalProperties");
        let declares_shape = properties.is_some() || patterns.is_some() || additional.is_some();
        match (self.remove_additional, additional) {
            (RemoveAdditional::All, _) if declares_shape => {
                for key in &undeclared {
                    map.remove(key);
                }
            }
            (RemoveAdditional::Declared | RemoveAdditional::Failing, Some(Value::Bool(false))) => {
                for key in &undeclared {
                    map.remove(key);
                }
            }
            (mode, Some(sub @ Value::Object(_))) => {
                for key in &undeclared {
                    if mode == RemoveAdditional::Failing
                        && map.get(key).is_some_and(|v| !self.passes(sub, v))
                    {
                        map.remove(key);
                        continue;
                    }
                    if let Some(child) = map.get_mut(key) {
                        let next = at.child(key, &["additionalProperties"]);
                        self.walk(sub, doc, child, &next, depth + 1, issues);
                    }
                }
            }
            _ => {}
        }
    }

    fn shape_array(
        &self,
        obj: &Map<String, Value>,
        doc: &Value,
        value: &mut Value,
        at: &Location,
        depth: usize,
        issues: &mut Vec<ValidationIssue>,
    ) {
        let Some(items) = value.as_array_mut() else {
            return;
        };

        let tuple = match (obj.get("prefixItems"), obj.get("items")) {
            (Some(Value::Array(prefix)), _) => Some(("prefixItems", prefix)),
            (_, Some(Value::Array(positional))) => Some(("items", positional)),
            _ => None,
        };
        let mut start = 0;
        if let Some((keyword, positional)) = tuple {
            for (i, sub) in positional.iter().enumerate() {
                if let Some(child) = items.get_mut(i) {
                    let index = i.to_string();
                    let next = at.child(&index, &[keyword, &index]);
                    self.walk(sub, doc, child, &next, depth + 1, issues);
                }
            }
            start = positional.len();
        }

        let rest = match (obj.get("items"), obj.get("additionalItems")) {
            (Some(sub @ Value::Object(_)), _) => Some(("items", sub)),
            (Some(Value::Array(_)), Some(sub @ Value::Object(_))) => Some(("additionalItems", sub)),
            _ => None,
        };
        if let Some((keyword, sub)) = rest {
            for (i, child) in items.iter_mut().enumerate().skip(start) {
                let next = at.child(&i.to_string(), &[keyword]);
                self.walk(sub, doc, child, &next, depth + 1, issues);
            }
        }
    }

    /// Whether `value` satisfies an `additionalProperties` schema.
    ///
    /// Subschemas `jsonschema` cannot compile on their own (for example
    /// ones holding a relative `$ref`) count as passing.
    fn passes(&self, schema: &Value, value: &Value) -> bool {
        let validator = {
            let mut cache = self.additional.lock();
            cache
                .entry(schema.to_string())
                .or_insert_with(|| jsonschema::validator_for(schema).ok().map(Arc::new))
                .clone()
        };
        validator.map_or(true, |v| v.is_valid(value))
    }
}

fn type_names(types: &Value) -> Vec<&str> {
    match types {
        Value::String(t) => vec![t.as_str()],
        Value::Array(ts) => ts.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

pub(crate) fn matches_type(value: &Value, ty: &str) -> bool {
    match ty {
        "null" => value.is_null(),
        "boolean" => value.is_boolean(),
        "string" => value.is_string(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "number" => value.is_number(),
        "integer" => is_integer(value),
        _ => false,
    }
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
        }
        _ => false,
    }
}

/// Coerce `value` towards the first of `types` it can become.
fn coerce(value: &mut Value, types: &[&str], mode: CoerceTypes) {
    if types.is_empty() || types.iter().any(|t| matches_type(value, t)) {
        return;
    }
    if mode == CoerceTypes::Array {
        if types.contains(&"array") {
            let inner = value.take();
            *value = Value::Array(vec![inner]);
            return;
        }
        if let Value::Array(items) = value {
            if items.len() == 1 {
                let inner = items.remove(0);
                *value = inner;
                if types.iter().any(|t| matches_type(value, t)) {
                    return;
                }
            }
        }
    }
    for ty in types {
        if let Some(coerced) = coerce_scalar(value, ty) {
            *value = coerced;
            return;
        }
    }
}

fn coerce_scalar(value: &Value, ty: &str) -> Option<Value> {
    match (ty, value) {
        ("string", Value::Number(n)) => Some(Value::String(n.to_string())),
        ("string", Value::Bool(b)) => Some(Value::String(b.to_string())),
        ("string", Value::Null) => Some(Value::String(String::new())),

        ("number", Value::String(s)) => parse_number(s),
        ("integer", Value::String(s)) => parse_number(s).filter(is_integer),
        ("number" | "integer", Value::Bool(b)) => Some(Value::from(u8::from(*b))),
        ("number" | "integer", Value::Null) => Some(Value::from(0)),

        ("boolean", Value::String(s)) if s == "true" => Some(Value::Bool(true)),
        ("boolean", Value::String(s)) if s == "false" => Some(Value::Bool(false)),
        ("boolean", Value::Number(n)) if n.as_f64() == Some(1.0) => Some(Value::Bool(true)),
        ("boolean", Value::Number(n)) if n.as_f64() == Some(0.0) => Some(Value::Bool(false)),
        ("boolean", Value::Null) => Some(Value::Bool(false)),

        ("null", Value::String(s)) if s.is_empty() => Some(Value::Null),
        ("null", Value::Number(n)) if n.as_f64() == Some(0.0) => Some(Value::Null),
        ("null", Value::Bool(false)) => Some(Value::Null),

        _ => None,
    }
}

fn parse_number(s: &str) -> Option<Value> {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed != s {
        return None;
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return Some(Value::from(n));
    }
    if let Ok(n) = trimmed.parse::<u64>() {
        return Some(Value::from(n));
    }
    let f = trimmed.parse::<f64>().ok().filter(|f| f.is_finite())?;
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        return Some(Value::from(f as i64));
    }
    Number::from_f64(f).map(Value::Number)
}
