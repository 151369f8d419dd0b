//! # Generate Subcommand
//!
//! Build-time step: compiles every route of a project in standalone write
//! mode and stores one source file per route in the output directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use scp_compiler::{CompilerPool, StandaloneCodeGenerator};

use crate::config::Project;
use crate::store::{source_path, FileStore};

/// Arguments for the `scp generate` subcommand.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Project file (YAML or JSON).
    #[arg(long, default_value = "scp.yaml")]
    pub project: PathBuf,

    /// Directory the standalone sources are written to.
    #[arg(long)]
    pub out: PathBuf,

    /// Generate serializers instead of validators.
    #[arg(long)]
    pub serializers: bool,
}

/// Execute the generate subcommand.
///
/// Returns exit code: 0 when every route compiled, 1 when any route failed.
pub fn run_generate(args: &GenerateArgs) -> Result<u8> {
    let project = Project::load(&args.project)?;
    let failed = generate(&project, &args.out, args.serializers)?;
    Ok(if failed > 0 { 1 } else { 0 })
}

/// Compile and store every route. Returns the number of failed routes.
pub fn generate(project: &Project, out: &Path, serializers: bool) -> Result<usize> {
    let pool = if serializers {
        CompilerPool::serializers()
    } else {
        CompilerPool::validators()
    };
    let generator = StandaloneCodeGenerator::write_mode(Arc::new(pool), Arc::new(FileStore::new(out)));
    let compiler = generator
        .build_compiler(&project.external, &project.options)
        .context("failed to build the schema compiler")?;

    let mut failed = 0;
    for route in &project.routes {
        match compiler.compile_route(route) {
            Ok(_) => println!(
                "  OK: {} {} ({}) -> {}",
                route.method,
                route.url,
                route.http_part,
                source_path(out, route).display()
            ),
            Err(e) => {
                failed += 1;
                println!("  FAIL: {} {} ({}): {e}", route.method, route.url, route.http_part);
            }
        }
    }
    println!("Routes: {}/{} generated", project.routes.len() - failed, project.routes.len());
    Ok(failed)
}
