use anyhow::{Context, Result};
use std::path::Path;

pub mod classify;
pub mod config;
pub mod counts;
pub mod extract;
pub mod filter;
pub mod pipeline;
pub mod reconcile;
pub mod reference;
pub mod samples;
pub mod summary;
pub mod table;

use config::Config;

pub fn run(toml_file: &Path) -> Result<()> {
    let raw_config = ex::fs::read_to_string(toml_file)
        .with_context(|| format!("Could not read toml file: {}", toml_file.to_string_lossy()))?;
    let parsed = toml::from_str::<Config>(&raw_config)
        .with_context(|| format!("Could not parse toml file: {}", toml_file.to_string_lossy()))?;
    parsed.check().context("Error in configuration")?;

    pipeline::run(&parsed).context("Error in pipeline")?;

    Ok(())
}
