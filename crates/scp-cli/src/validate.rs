//! # Validate Subcommand
//!
//! Runtime step: restores a route's validator from a directory written by
//! `scp generate` (standalone read mode, no engine is built) and validates
//! one payload with it.
//!
//! The route is addressed the same way the store addressed it: method,
//! url, HTTP part, and the schema `$id` when the schema declares one.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::{json, Value};

use scp_compiler::{CompilerOptions, StandaloneCodeGenerator};
use scp_core::{ExternalSchemaMap, HttpPart, RouteSchemaDescriptor};

use crate::store::FileRestore;

/// Arguments for the `scp validate` subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Directory written by `scp generate`.
    #[arg(long)]
    pub dir: PathBuf,

    #[arg(long)]
    pub method: String,

    #[arg(long)]
    pub url: String,

    /// body, headers, params or querystring.
    #[arg(long, value_parser = parse_part)]
    pub part: HttpPart,

    /// `$id` of the route schema, if it declares one.
    #[arg(long)]
    pub schema_id: Option<String>,

    /// Payload file (JSON or YAML). `-` reads standard input.
    #[arg(value_name = "PAYLOAD")]
    pub payload: PathBuf,
}

fn parse_part(s: &str) -> Result<HttpPart, String> {
    s.parse().map_err(|e: scp_core::CoreError| e.to_string())
}

/// Execute the validate subcommand.
///
/// Returns exit code: 0 when the payload is valid, 1 when it is not.
pub fn run_validate(args: &ValidateArgs) -> Result<u8> {
    let payload = read_payload(&args.payload)?;
    let descriptor = RouteSchemaDescriptor::new(
        args.method.to_ascii_uppercase(),
        args.url.clone(),
        args.part,
        match &args.schema_id {
            Some(id) => json!({"$id": id}),
            None => json!({}),
        },
    );
    let (valid, output) = validate(&args.dir, &descriptor, payload)?;
    println!("{output}");
    Ok(if valid { 0 } else { 1 })
}

/// Validate `payload` against the stored route. Returns whether it is valid
/// and the text to print: the shaped payload, or one line per issue.
pub fn validate(dir: &Path, descriptor: &RouteSchemaDescriptor, mut payload: Value) -> Result<(bool, String)> {
    let generator = StandaloneCodeGenerator::read_mode(Arc::new(FileRestore::new(dir)));
    let validator = generator
        .build_compiler(&ExternalSchemaMap::new(), &CompilerOptions::default())?
        .compile_route(descriptor)
        .with_context(|| {
            format!(
                "no usable validator for {} {} ({})",
                descriptor.method, descriptor.url, descriptor.http_part
            )
        })?;

    match validator.validate(&mut payload) {
        Ok(()) => Ok((true, serde_json::to_string_pretty(&payload)?)),
        Err(failure) => {
            let lines: Vec<String> = failure
                .errors
                .iter()
                .map(|issue| {
                    let at = if issue.instance_path.is_empty() { "/" } else { issue.instance_path.as_str() };
                    format!("  FAIL: {at} {} ({})", issue.message, issue.keyword)
                })
                .collect();
            Ok((false, lines.join("\n")))
        }
    }
}

fn read_payload(path: &Path) -> Result<Value> {
    let text = if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read payload from stdin")?;
        text
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read payload {}", path.display()))?
    };
    serde_yaml::from_str(&text).context("payload is not JSON or YAML")
}
