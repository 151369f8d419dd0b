//! # Compiled Artifacts
//!
//! A `CompiledArtifact` is the executable result of compiling one schema:
//! either a validator that checks and shapes a payload in place, or a
//! serializer that renders a value as JSON text.
//!
//! Artifacts are cheap handles around an `Arc`. Handing out the same
//! artifact twice means handing out two clones of one handle, which
//! [`CompiledArtifact::ptr_eq`] detects.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::options::EngineMode;

/// Whether an artifact validates input or serializes output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Validator,
    Serializer,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validator => "validator",
            Self::Serializer => "serializer",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single reason a payload failed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    /// The schema keyword that failed (`type`, `required`, ...).
    pub keyword: String,
    /// JSON pointer into the payload; empty for the root.
    pub instance_path: String,
    /// Fragment pointer into the schema, starting with `#`.
    pub schema_path: String,
    /// Human-readable message.
    pub message: String,
    /// Keyword-specific parameters (`{"missingProperty": "name"}`).
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl ValidationIssue {
    pub fn new(
        keyword: impl Into<String>,
        instance_path: impl Into<String>,
        schema_path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            keyword: keyword.into(),
            instance_path: instance_path.into(),
            schema_path: schema_path.into(),
            message: message.into(),
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{} {}", self.instance_path, self.message)
        }
    }
}

/// The ordered list of issues a validator reported.
///
/// Not an exceptional condition: this is the `false` branch of a validator.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{}", render_issues(.errors))]
pub struct ValidationFailure {
    pub errors: Vec<ValidationIssue>,
}

impl ValidationFailure {
    pub fn new(errors: Vec<ValidationIssue>) -> Self {
        Self { errors }
    }
}

fn render_issues(errors: &[ValidationIssue]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Material kept on an artifact when source emission is on.
///
/// Replaces any hidden pointer back to the engine: a code generator reads
/// the schema and mode from here and asks the engine for the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactSource {
    pub schema: Value,
    pub mode: EngineMode,
}

type ValidateFn = dyn Fn(&mut Value) -> Result<(), ValidationFailure> + Send + Sync;
type SerializeFn = dyn Fn(&Value) -> String + Send + Sync;

enum Callable {
    Validator(Box<ValidateFn>),
    Serializer(Box<SerializeFn>),
}

struct ArtifactInner {
    callable: Callable,
    source: Option<ArtifactSource>,
}

/// Shared handle to a compiled validate or serialize function.
#[derive(Clone)]
pub struct CompiledArtifact {
    inner: Arc<ArtifactInner>,
}

impl CompiledArtifact {
    /// Wrap a validate function.
    pub fn validator<F>(f: F, source: Option<ArtifactSource>) -> Self
    where
        F: Fn(&mut Value) -> Result<(), ValidationFailure> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(ArtifactInner {
                callable: Callable::Validator(Box::new(f)),
                source,
            }),
        }
    }

    /// Wrap a serialize function.
    pub fn serializer<F>(f: F, source: Option<ArtifactSource>) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(ArtifactInner {
                callable: Callable::Serializer(Box::new(f)),
                source,
            }),
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        match self.inner.callable {
            Callable::Validator(_) => ArtifactKind::Validator,
            Callable::Serializer(_) => ArtifactKind::Serializer,
        }
    }

    /// Validate `payload`, coercing, defaulting and stripping it in place.
    ///
    /// Called on a serializer, this reports a single `artifact` issue.
    pub fn validate(&self, payload: &mut Value) -> Result<(), ValidationFailure> {
        match &self.inner.callable {
            Callable::Validator(f) => f(payload),
            Callable::Serializer(_) => Err(ValidationFailure::new(vec![ValidationIssue::new(
                "artifact",
                "",
                "#",
                "serializer artifacts cannot validate",
            )])),
        }
    }

    /// Convenience wrapper over [`validate`](Self::validate).
    pub fn is_valid(&self, payload: &mut Value) -> bool {
        self.validate(payload).is_ok()
    }

    /// Render `value` as JSON text. Never fails.
    ///
    /// Called on a validator, this renders the value unshaped.
    pub fn serialize(&self, value: &Value) -> String {
        match &self.inner.callable {
            Callable::Serializer(f) => f(value),
            Callable::Validator(_) => value.to_string(),
        }
    }

    pub fn source(&self) -> Option<&ArtifactSource> {
        self.inner.source.as_ref()
    }

    /// Whether both handles point at the same compiled function.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for CompiledArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledArtifact")
            .field("kind", &self.kind())
            .field("has_source", &self.inner.source.is_some())
            .finish()
    }
}
