//! # Extension Points
//!
//! Plugins customize an engine through these traits. They are object-safe
//! and `Send + Sync` so an engine holding them stays shareable.

use std::sync::Arc;

use serde_json::Value;

use crate::artifact::ValidationIssue;
use crate::localize::PortableLocalizer;

/// A format checker: `true` when the string satisfies the format.
pub type FormatCheck = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// A custom schema keyword.
///
/// Called with the keyword's value from the schema and the (already
/// shaped) payload fragment the schema applies to.
pub trait KeywordCheck: Send + Sync {
    /// `Err(message)` when the fragment violates the keyword.
    fn check(&self, keyword_value: &Value, instance: &Value) -> Result<(), String>;
}

impl<F> KeywordCheck for F
where
    F: Fn(&Value, &Value) -> Result<(), String> + Send + Sync,
{
    fn check(&self, keyword_value: &Value, instance: &Value) -> Result<(), String> {
        self(keyword_value, instance)
    }
}

/// Rewrites the message of a validation issue.
///
/// `schema` is the root schema the issue was produced against. Returning
/// `None` keeps the current message.
pub trait MessageLocalizer: Send + Sync {
    fn localize(&self, issue: &ValidationIssue, schema: &Value) -> Option<String>;

    /// The data form standalone bundles carry. `None` for localizers that
    /// are code; engines holding one cannot emit standalone source.
    fn portable(&self) -> Option<PortableLocalizer> {
        None
    }
}

/// Resolves a `$ref` URI that no registered schema answers.
pub trait ReferenceResolver: Send + Sync {
    fn resolve(&self, uri: &str) -> Option<Value>;
}

impl<F> ReferenceResolver for F
where
    F: Fn(&str) -> Option<Value> + Send + Sync,
{
    fn resolve(&self, uri: &str) -> Option<Value> {
        self(uri)
    }
}

/// Apply localizers in registration order; each sees the previous result.
pub(crate) fn localize_all(
    localizers: &[Arc<dyn MessageLocalizer>],
    issues: &mut [ValidationIssue],
    schema: &Value,
) {
    if localizers.is_empty() {
        return;
    }
    for issue in issues.iter_mut() {
        for localizer in localizers {
            if let Some(message) = localizer.localize(issue, schema) {
                issue.message = message;
            }
        }
    }
}
