//! # Built-in Message Localizers
//!
//! Two localizers whose behavior is fully described by data, so standalone
//! bundles can carry them: [`ErrorMessageLocalizer`] reads `errorMessage`
//! from the schema itself, [`CatalogLocalizer`] renders keyword templates.
//!
//! Any other [`MessageLocalizer`] is code. An engine holding one refuses
//! to emit standalone source.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::artifact::ValidationIssue;
use crate::error::EngineError;
use crate::extension::MessageLocalizer;

/// The data form of a built-in localizer, as stored in a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PortableLocalizer {
    ErrorMessage,
    Catalog { messages: BTreeMap<String, String> },
}

impl PortableLocalizer {
    pub fn into_localizer(self) -> Arc<dyn MessageLocalizer> {
        match self {
            Self::ErrorMessage => Arc::new(ErrorMessageLocalizer),
            Self::Catalog { messages } => Arc::new(CatalogLocalizer::new(messages)),
        }
    }
}

/// The data form of every localizer, in order.
///
/// # Errors
///
/// `NotPortable` naming the first localizer that is code.
pub(crate) fn portable_localizers(
    localizers: &[Arc<dyn MessageLocalizer>],
) -> Result<Vec<PortableLocalizer>, EngineError> {
    localizers
        .iter()
        .map(|l| {
            l.portable()
                .ok_or_else(|| EngineError::NotPortable("a custom message localizer".into()))
        })
        .collect()
}

/// Honours `errorMessage` declared in the schema.
///
/// `errorMessage` is either a string, used for every issue raised in that
/// schema or below it, or an object keyed by keyword. For `required` the
/// value may itself be an object keyed by the missing property. The key `_`
/// is the fallback for keywords the object does not name.
///
/// The nearest enclosing schema that answers wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorMessageLocalizer;

/// Keywords whose value maps names to schemas rather than being a schema.
const SCHEMA_MAPS: &[&str] = &[
    "properties",
    "optionalProperties",
    "patternProperties",
    "definitions",
    "$defs",
    "dependentSchemas",
    "mapping",
];

impl MessageLocalizer for ErrorMessageLocalizer {
    fn localize(&self, issue: &ValidationIssue, schema: &Value) -> Option<String> {
        let path = issue.schema_path.trim_start_matches('#');
        let mut schemas = vec![schema];
        let mut node = schema;
        let mut in_map = false;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let segment = segment.replace("~1", "/").replace("~0", "~");
            let next = match node {
                Value::Object(map) => map.get(&segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            let Some(next) = next else {
                break;
            };
            let is_map_value = SCHEMA_MAPS.contains(&segment.as_str()) && !in_map;
            if next.is_object() && !is_map_value {
                schemas.push(next);
            }
            in_map = is_map_value;
            node = next;
        }
        schemas
            .iter()
            .rev()
            .filter_map(|s| s.get("errorMessage"))
            .find_map(|declared| message_for(declared, issue))
    }

    fn portable(&self) -> Option<PortableLocalizer> {
        Some(PortableLocalizer::ErrorMessage)
    }
}

fn message_for(declared: &Value, issue: &ValidationIssue) -> Option<String> {
    match declared {
        Value::String(message) => Some(message.clone()),
        Value::Object(by_keyword) => {
            let specific = match by_keyword.get(&issue.keyword) {
                Some(Value::String(message)) => Some(message.clone()),
                Some(Value::Object(by_property)) => issue
                    .params
                    .get("missingProperty")
                    .and_then(Value::as_str)
                    .and_then(|p| by_property.get(p))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            };
            specific.or_else(|| by_keyword.get("_").and_then(Value::as_str).map(str::to_string))
        }
        _ => None,
    }
}

/// Rewrites messages from a keyword catalog.
///
/// Templates may use `{instancePath}`, `{keyword}` and the name of any
/// issue param (`{missingProperty}`, `{limit}`, ...).
#[derive(Debug, Clone, Default)]
pub struct CatalogLocalizer {
    messages: BTreeMap<String, String>,
}

impl CatalogLocalizer {
    pub fn new(messages: BTreeMap<String, String>) -> Self {
        Self { messages }
    }
}

impl MessageLocalizer for CatalogLocalizer {
    fn localize(&self, issue: &ValidationIssue, _schema: &Value) -> Option<String> {
        let template = self.messages.get(&issue.keyword)?;
        let mut message = template
            .replace("{instancePath}", &issue.instance_path)
            .replace("{keyword}", &issue.keyword);
        for (name, value) in &issue.params {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            message = message.replace(&format!("{{{name}}}"), &rendered);
        }
        Some(message)
    }

    fn portable(&self) -> Option<PortableLocalizer> {
        Some(PortableLocalizer::Catalog {
            messages: self.messages.clone(),
        })
    }
}
