//! # pledger-cli — Operator CLI
//!
//! Offline checks an operator runs before touching a live deployment.
//!
//! ## Subcommands
//!
//! - `pledger version`: Compare and validate policy version strings.
//! - `pledger revoke`: Plan a cascade from a message dump; validate
//!   revoke-block options.
//! - `pledger config`: Load and validate an engine config file.
//!
//! ```bash
//! pledger version compare 1.10.0 1.2.0
//! pledger revoke plan --messages topic-dump.json --trigger 1700000000.000000042
//! pledger config check engine.yaml
//! ```

pub mod config;
pub mod revoke;
pub mod version;

use std::path::Path;

use anyhow::{Context, Result};

/// Read a JSON file into `T`.
pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}
