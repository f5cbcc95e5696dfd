use anyhow::{Context, Result};
use std::path::Path;

fn main() -> Result<()> {
    if std::env::var("NO_FRIENDLY_PANIC").is_err() {
        human_panic::setup_panic!();
    }
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let toml_file = std::env::args()
        .nth(1)
        .context("Usage: glyco-psm-pipeline <config.toml>")?;
    glyco_psm_pipeline::run(Path::new(&toml_file))
}
