//! # Route Descriptors
//!
//! A `RouteSchemaDescriptor` is the compile request handed to the pool by
//! route registration. It is built once and then only read.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::digest::Fingerprint;
use crate::error::CoreError;

/// Externally registered schemas, keyed by identifier.
///
/// A `BTreeMap` so iteration (and therefore registration order) is
/// deterministic.
pub type ExternalSchemaMap = BTreeMap<String, Value>;

/// The part of an HTTP request a schema applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpPart {
    /// Request body.
    Body,
    /// Request headers.
    Headers,
    /// Path parameters.
    Params,
    /// Query string.
    Querystring,
}

impl HttpPart {
    /// Wire name of the part.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Body => "body",
            Self::Headers => "headers",
            Self::Params => "params",
            Self::Querystring => "querystring",
        }
    }
}

impl fmt::Display for HttpPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpPart {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "body" => Ok(Self::Body),
            "headers" => Ok(Self::Headers),
            "params" => Ok(Self::Params),
            "querystring" | "query" => Ok(Self::Querystring),
            other => Err(CoreError::InvalidRoute(format!("unknown http part '{other}'"))),
        }
    }
}

/// One compile request: which route, which part, which schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSchemaDescriptor {
    /// HTTP method, upper-cased by convention (`GET`, `POST`, ...).
    pub method: String,
    /// Route URL pattern as registered (`/users/:id`).
    pub url: String,
    /// Request part the schema applies to.
    pub http_part: HttpPart,
    /// Response status the schema serializes, for serializer routes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<String>,
    /// The schema document.
    pub schema: Value,
}

impl RouteSchemaDescriptor {
    /// Build a descriptor for a request part.
    pub fn new(
        method: impl Into<String>,
        url: impl Into<String>,
        http_part: HttpPart,
        schema: Value,
    ) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            http_part,
            http_status: None,
            schema,
        }
    }

    /// Attach the response status this schema serializes.
    pub fn with_http_status(mut self, status: impl Into<String>) -> Self {
        self.http_status = Some(status.into());
        self
    }

    /// The schema's `$id`, if it declares one.
    pub fn schema_id(&self) -> Option<&str> {
        self.schema.get("$id").and_then(Value::as_str)
    }

    /// A stable, filesystem-safe identifier for this route.
    ///
    /// A readable prefix of `(schema $id, method, http part, status, url)`
    /// followed by 16 hex digits of a SHA-256 over the unsanitized fields.
    /// The prefix alone is lossy: `/users/:id` and `/users-id` read the
    /// same. Store and restore collaborators use the key to address
    /// persisted source.
    pub fn storage_key(&self) -> String {
        let method = self.method.to_ascii_uppercase();
        let mut parts = Vec::with_capacity(6);
        if let Some(id) = self.schema_id() {
            parts.push(sanitize(id));
        }
        parts.push(sanitize(&method));
        parts.push(self.http_part.as_str().to_string());
        if let Some(status) = &self.http_status {
            parts.push(sanitize(status));
        }
        parts.push(sanitize(&self.url));

        // `=` marks a present optional field, so `None` and `Some("")` differ.
        let id = self.schema_id().map(|id| format!("={id}")).unwrap_or_default();
        let status = self
            .http_status
            .as_deref()
            .map(|status| format!("={status}"))
            .unwrap_or_default();
        let digest = Fingerprint::of_fields([
            id.as_bytes(),
            method.as_bytes(),
            self.http_part.as_str().as_bytes(),
            status.as_bytes(),
            self.url.as_bytes(),
        ]);
        parts.push(digest.to_hex()[..16].to_string());
        parts.join("-")
    }
}

/// Replace every character outside `[A-Za-z0-9._]` with `_`, collapsing runs.
fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_underscore = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() || c == '.' {
            out.push(c);
            last_underscore = false;
        } else if !last_underscore {
            out.push('_');
            last_underscore = true;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}
