use clap::Parser;
use std::process::ExitCode;
use tracing::info;
use logstore::{cli::Cli, config::Config, utils::init_logger};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize tracing
    init_logger();

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded: {:?}", config.server);

    logstore::cli::run(cli, config).await
}
