use clap::Parser;
use colored::Colorize;

use flash_offers::cli::{Cli, Commands};
use flash_offers::config::{DEFAULT_CONFIG_PATH, get_config, init_config_from};
use flash_offers::runtime::modes;
use flash_offers::system::init_logging;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Some(Commands::ConfigGen { output_path, force }) = &cli.command {
        return modes::run_config_gen(output_path.as_deref(), *force);
    }

    init_config_from(cli.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH));
    let config = get_config();
    let _guard = init_logging(&config);

    let result = match cli.command {
        Some(Commands::Sweep) => modes::run_sweep().await,
        Some(Commands::Serve) | None => modes::run_server().await,
        Some(Commands::ConfigGen { .. }) => Ok(()),
    };

    if let Err(e) = &result {
        eprintln!("{} {:#}", "[ERROR]".red().bold(), e);
    }
    result
}
