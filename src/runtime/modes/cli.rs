//! One-shot commands
//!
//! `sweep` runs the same maintenance pass the server schedules in the
//! background; `config-gen` writes the default configuration as TOML.

use anyhow::{Result, bail};
use colored::Colorize;
use std::path::Path;
use tracing::info;

use crate::config::StaticConfig;
use crate::runtime::lifetime;

const DEFAULT_SAMPLE_PATH: &str = "config.example.toml";

pub async fn run_sweep() -> Result<()> {
    let ctx = lifetime::startup::prepare_startup().await?;
    let report = lifetime::startup::run_sweep(&ctx).await;

    info!("Sweep complete: {:?}", report);
    println!(
        "{} offers activated: {}, offers expired: {}, claims expired: {}, offers pushed: {}",
        "[OK]".green().bold(),
        report.offers_activated,
        report.offers_expired,
        report.claims_expired,
        report.offers_pushed
    );
    Ok(())
}

pub fn run_config_gen(output_path: Option<&str>, force: bool) -> Result<()> {
    let path = output_path.unwrap_or(DEFAULT_SAMPLE_PATH);
    if Path::new(path).exists() && !force {
        bail!("{} already exists, pass --force to overwrite", path);
    }

    StaticConfig::default()
        .save_to_file(path)
        .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", path, e))?;
    println!("{} Sample configuration written to {}", "[OK]".green().bold(), path);
    Ok(())
}
