//! # scp-cli — Command Line for the Schema Compiler Pool
//!
//! Provides the `scp` binary. Route schemas are compiled ahead of time and
//! restored at runtime without building an engine:
//!
//! ```bash
//! scp generate --project scp.yaml --out generated/
//! scp validate --dir generated/ --method POST --url /users --part body payload.json
//! ```
//!
//! ## Subcommands
//!
//! - `scp generate`: standalone write mode over a project file.
//! - `scp validate`: standalone read mode for one route and one payload.

pub mod config;
pub mod generate;
pub mod store;
pub mod validate;
