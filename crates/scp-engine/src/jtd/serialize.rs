//! Compiled JTD serialization.
//!
//! Properties are written in schema order, the discriminator tag first.
//! A value that does not fit the schema is written as plain JSON.

use serde_json::{Map, Value};

const MAX_DEPTH: usize = 64;

pub(crate) struct JtdSerializer {
    root: Value,
}

impl JtdSerializer {
    pub(crate) fn new(root: Value) -> Self {
        Self { root }
    }

    pub(crate) fn render(&self, value: &Value) -> String {
        let mut out = String::new();
        self.write(&self.root, value, None, 0, &mut out);
        out
    }

    fn definitions(&self) -> Option<&Map<String, Value>> {
        self.root.get("definitions").and_then(Value::as_object)
    }

    fn write(
        &self,
        schema: &Value,
        value: &Value,
        tag: Option<(&str, &str)>,
        depth: usize,
        out: &mut String,
    ) {
        let Some(obj) = schema.as_object() else {
            out.push_str(&value.to_string());
            return;
        };
        if depth > MAX_DEPTH || value.is_null() {
            out.push_str(&value.to_string());
            return;
        }

        if let Some(name) = obj.get("ref").and_then(Value::as_str) {
            match self.definitions().and_then(|d| d.get(name)) {
                Some(target) => self.write(target, value, None, depth + 1, out),
                None => out.push_str(&value.to_string()),
            }
            return;
        }

        if let Some(elements) = obj.get("elements") {
            match value.as_array() {
                Some(items) => {
                    out.push('[');
                    for (i, item) in items.iter().enumerate() {
                        if i > 0 {
                            out.push(',');
                        }
                        self.write(elements, item, None, depth + 1, out);
                    }
                    out.push(']');
                }
                None => out.push_str(&value.to_string()),
            }
            return;
        }

        if obj.contains_key("properties") || obj.contains_key("optionalProperties") {
            match value.as_object() {
                Some(map) => self.write_properties(obj, map, tag, depth, out),
                None => out.push_str(&value.to_string()),
            }
            return;
        }

        if let Some(values) = obj.get("values") {
            match value.as_object() {
                Some(map) => {
                    out.push('{');
                    for (i, (key, v)) in map.iter().enumerate() {
                        if i > 0 {
                            out.push(',');
                        }
                        write_key(key, out);
                        self.write(values, v, None, depth + 1, out);
                    }
                    out.push('}');
                }
                None => out.push_str(&value.to_string()),
            }
            return;
        }

        if let Some(tag_name) = obj.get("discriminator").and_then(Value::as_str) {
            let variant = value
                .get(tag_name)
                .and_then(Value::as_str)
                .and_then(|t| {
                    obj.get("mapping")
                        .and_then(|m| m.get(t))
                        .map(|schema| (t, schema))
                });
            match variant {
                Some((t, variant_schema)) => {
                    self.write(variant_schema, value, Some((tag_name, t)), depth + 1, out)
                }
                None => out.push_str(&value.to_string()),
            }
            return;
        }

        // Empty, type and enum forms write the value as is.
        out.push_str(&value.to_string());
    }

    fn write_properties(
        &self,
        obj: &Map<String, Value>,
        map: &Map<String, Value>,
        tag: Option<(&str, &str)>,
        depth: usize,
        out: &mut String,
    ) {
        let required = obj.get("properties").and_then(Value::as_object);
        let optional = obj.get("optionalProperties").and_then(Value::as_object);
        let mut first = true;

        out.push('{');
        if let Some((name, variant)) = tag {
            separate(&mut first, out);
            write_key(name, out);
            out.push_str(&Value::from(variant).to_string());
        }
        for props in [required, optional].into_iter().flatten() {
            for (key, sub) in props {
                if let Some(v) = map.get(key) {
                    separate(&mut first, out);
                    write_key(key, out);
                    self.write(sub, v, None, depth + 1, out);
                }
            }
        }
        if obj.get("additionalProperties") == Some(&Value::Bool(true)) {
            for (key, v) in map {
                let declared = required.is_some_and(|p| p.contains_key(key))
                    || optional.is_some_and(|p| p.contains_key(key))
                    || tag.is_some_and(|(name, _)| name == key.as_str());
                if !declared {
                    separate(&mut first, out);
                    write_key(key, out);
                    out.push_str(&v.to_string());
                }
            }
        }
        out.push('}');
    }
}

fn separate(first: &mut bool, out: &mut String) {
    if !*first {
        out.push(',');
    }
    *first = false;
}

fn write_key(key: &str, out: &mut String) {
    out.push_str(&Value::from(key).to_string());
    out.push(':');
}
