use anyhow::Result;
use clap::Parser;

use stockcast_cli::Config;
use stockcast_cli::cli::commands::{analyze, forecast, soh};
use stockcast_cli::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = Config::load(cli.config.as_deref())?;
    log::debug!("Using database at {}", config.database.path.display());

    match cli.command {
        Commands::Analyze(args) => analyze::handle_analyze_command(args, &config).await,
        Commands::Soh { command } => soh::handle_soh_command(command, &config).await,
        Commands::Forecast { command } => forecast::handle_forecast_command(command, &config).await,
    }
}
