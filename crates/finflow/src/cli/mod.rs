//! CLI commands for finflow
//!
//! Each command takes a fully resolved [`IngestConfig`] and prints either a
//! human-readable summary or JSON.

pub mod archive;
pub mod config;
pub mod export;
pub mod ingest;
pub mod ledger;
pub mod output;

use anyhow::{Context, Result};
use finflow_ingest::{ConfigOverrides, IngestConfig};
use std::path::Path;

/// Config file (if any), then explicit overrides.
pub fn resolve_config(path: Option<&Path>, overrides: ConfigOverrides) -> Result<IngestConfig> {
    IngestConfig::resolve(path, overrides).with_context(|| match path {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Invalid configuration".to_string(),
    })
}
