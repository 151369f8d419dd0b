//! Schema-driven serialization for draft schemas.
//!
//! Output is shaped by the schema: objects keep declared properties only
//! (plus additional ones when `additionalProperties` allows them), scalars
//! are converted to the declared type, and missing properties with a
//! `default` are filled. Values the schema cannot describe are written as
//! plain JSON.

use serde_json::{Map, Number, Value};

use super::shape::matches_type;
use super::{PatternCache, SchemaSet, MAX_DEPTH};

pub(crate) struct DraftSerializer {
    set: SchemaSet,
    patterns: PatternCache,
}

impl DraftSerializer {
    pub(crate) fn new(set: SchemaSet) -> Self {
        Self {
            set,
            patterns: PatternCache::default(),
        }
    }

    pub(crate) fn render(&self, value: &Value) -> String {
        let root = self.set.root();
        self.shape(root, root, value, 0).to_string()
    }

    fn shape(&self, schema: &Value, doc: &Value, value: &Value, depth: usize) -> Value {
        if depth > MAX_DEPTH {
            return value.clone();
        }
        let Some(obj) = schema.as_object() else {
            return value.clone();
        };

        if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
            return match self.set.resolve(reference, doc) {
                Some((target, target_doc)) => self.shape(target, target_doc, value, depth + 1),
                None => value.clone(),
            };
        }

        let mut shaped = match declared_type(obj, value) {
            Some("object") => match value.as_object() {
                Some(map) => Value::Object(self.shape_object(obj, doc, map, depth)),
                None => value.clone(),
            },
            Some("array") => match value.as_array() {
                Some(items) => Value::Array(self.shape_items(obj, doc, items, depth)),
                None => value.clone(),
            },
            Some(scalar) => convert_scalar(value, scalar),
            None => value.clone(),
        };

        if let (Some(Value::Array(subschemas)), Some(map)) = (obj.get("allOf"), value.as_object()) {
            for sub in subschemas {
                if let (Value::Object(out), Value::Object(extra)) =
                    (&mut shaped, self.shape(sub, doc, &Value::Object(map.clone()), depth + 1))
                {
                    out.extend(extra);
                }
            }
        }
        shaped
    }

    fn shape_object(
        &self,
        obj: &Map<String, Value>,
        doc: &Value,
        map: &Map<String, Value>,
        depth: usize,
    ) -> Map<String, Value> {
        let mut out = Map::new();
        let properties = obj.get("properties").and_then(Value::as_object);
        if let Some(props) = properties {
            for (key, sub) in props {
                match map.get(key) {
                    Some(v) => {
                        out.insert(key.clone(), self.shape(sub, doc, v, depth + 1));
                    }
                    None => {
                        if let Some(default) = sub.get("default") {
                            out.insert(key.clone(), default.clone());
                        }
                    }
                }
            }
        }

        let patterns = obj.get("patternProperties").and_then(Value::as_object);
        let additional = obj.get("additionalProperties");
        for (key, v) in map {
            if out.contains_key(key) || properties.is_some_and(|p| p.contains_key(key)) {
                continue;
            }
            let pattern_schema = patterns.and_then(|p| {
                p.iter()
                    .find(|(pattern, _)| self.patterns.is_match(pattern, key))
                    .map(|(_, sub)| sub)
            });
            if let Some(sub) = pattern_schema {
                out.insert(key.clone(), self.shape(sub, doc, v, depth + 1));
                continue;
            }
            match additional {
                Some(Value::Bool(true)) => {
                    out.insert(key.clone(), v.clone());
                }
                Some(sub @ Value::Object(_)) => {
                    out.insert(key.clone(), self.shape(sub, doc, v, depth + 1));
                }
                _ => {}
            }
        }
        out
    }

    fn shape_items(
        &self,
        obj: &Map<String, Value>,
        doc: &Value,
        items: &[Value],
        depth: usize,
    ) -> Vec<Value> {
        let positional: &[Value] = match (obj.get("prefixItems"), obj.get("items")) {
            (Some(Value::Array(prefix)), _) => prefix.as_slice(),
            (_, Some(Value::Array(positional))) => positional.as_slice(),
            _ => &[],
        };
        let rest = match (obj.get("items"), obj.get("additionalItems")) {
            (Some(sub @ Value::Object(_)), _) => Some(sub),
            (Some(Value::Array(_)), Some(sub @ Value::Object(_))) => Some(sub),
            _ => None,
        };
        items
            .iter()
            .enumerate()
            .map(|(i, item)| match positional.get(i).or(rest) {
                Some(sub) => self.shape(sub, doc, item, depth + 1),
                None => item.clone(),
            })
            .collect()
    }
}

/// The type to render `value` as: one it already has, else the first
/// declared non-null type. Untyped schemas are inferred from their keywords.
fn declared_type<'a>(obj: &'a Map<String, Value>, value: &Value) -> Option<&'a str> {
    let types: Vec<&str> = match obj.get("type") {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(ts)) => ts.iter().filter_map(Value::as_str).collect(),
        _ => {
            if obj.contains_key("properties") || obj.contains_key("additionalProperties") {
                vec!["object"]
            } else if obj.contains_key("items") || obj.contains_key("prefixItems") {
                vec!["array"]
            } else {
                Vec::new()
            }
        }
    };
    if let Some(t) = types.iter().find(|t| matches_type(value, t)) {
        return Some(*t);
    }
    if value.is_null() && obj.get("nullable") == Some(&Value::Bool(true)) {
        return Some("null");
    }
    types.into_iter().find(|t| *t != "null")
}

fn convert_scalar(value: &Value, ty: &str) -> Value {
    match (ty, value) {
        ("string", Value::String(_)) => value.clone(),
        ("string", Value::Number(n)) => Value::String(n.to_string()),
        ("string", Value::Bool(b)) => Value::String(b.to_string()),
        ("string", Value::Null) => Value::String(String::new()),

        ("integer", Value::Number(n)) => {
            if n.is_i64() || n.is_u64() {
                value.clone()
            } else {
                n.as_f64().map_or_else(|| value.clone(), |f| truncated(f, value))
            }
        }
        ("integer", Value::String(s)) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                Value::from(i)
            } else if let Ok(u) = s.parse::<u64>() {
                Value::from(u)
            } else {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map_or_else(|| value.clone(), |f| truncated(f, value))
            }
        }
        ("number", Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map_or_else(|| value.clone(), Value::Number),
        ("number" | "integer", Value::Bool(b)) => Value::from(u8::from(*b)),
        ("number" | "integer", Value::Null) => Value::from(0),

        ("boolean", Value::Bool(_)) => value.clone(),
        ("boolean", Value::Number(n)) => Value::Bool(n.as_f64().is_some_and(|f| f != 0.0)),
        ("boolean", Value::String(s)) => Value::Bool(!s.is_empty()),
        ("boolean", Value::Null) => Value::Bool(false),

        ("null", _) => Value::Null,
        _ => value.clone(),
    }
}

/// `f` without its fraction, as an integer when it fits `i64` or `u64`.
/// Larger magnitudes stay floats; `original` is kept if even that fails.
fn truncated(f: f64, original: &Value) -> Value {
    // 2^63 and 2^64; both convert to f64 exactly.
    const I64_END: f64 = 9_223_372_036_854_775_808.0;
    const U64_END: f64 = 18_446_744_073_709_551_616.0;
    let t = f.trunc();
    if (-I64_END..I64_END).contains(&t) {
        Value::from(t as i64)
    } else if (0.0..U64_END).contains(&t) {
        Value::from(t as u64)
    } else {
        Number::from_f64(t).map_or_else(|| original.clone(), Value::Number)
    }
}
