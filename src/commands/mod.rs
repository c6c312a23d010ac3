//! Command implementations for the CLI
//!
//! - config: Configuration display and validation
//! - pricing: Print the model pricing table
//! - select: Preview model selection
//! - generate: Send a prompt through the provider manager
//! - health: Provider health report

pub mod config;
pub mod generate;
pub mod health;
pub mod pricing;
pub mod select;

use anyhow::Result;
use llm_broker::config::{load_config, Config};
use std::path::Path;
use tracing::warn;

/// Load the config file, or fall back to defaults when it does not exist
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        return load_config(path);
    }
    warn!(path = %path.display(), "Config file not found, using defaults");
    Ok(Config::default())
}
