// Command line interface

pub mod store;

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Config;
use crate::models::AppState;
use crate::routes::{create_router, response::to_pretty_json};
use crate::transfer::BlobTransfer;

pub use store::StoreCommand;

#[derive(Debug, Parser)]
#[command(name = "logstore")]
#[command(about = "Account-scoped log blob storage", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Server,

    /// Storage commands
    #[command(subcommand)]
    Store(StoreCommand),
}

pub async fn run(cli: Cli, config: Config) -> anyhow::Result<ExitCode> {
    let transfer = BlobTransfer::from_config(&config).await?;

    match cli.command {
        Command::Server => {
            serve(transfer, config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Store(command) => {
            let mut stdout = tokio::io::stdout();
            match store::execute(&transfer, command, &mut stdout).await {
                Ok(()) => Ok(ExitCode::SUCCESS),
                Err(e) => {
                    error!("Store command failed: {}", e);
                    let body = serde_json::json!({ "error_msg": e.public_message() });
                    eprint!("{}", String::from_utf8_lossy(&to_pretty_json(&body)?));
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

async fn serve(transfer: BlobTransfer, config: Config) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    let state = AppState {
        transfer: Arc::new(transfer),
        config: Arc::new(config),
    };
    let app = create_router(state);

    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
