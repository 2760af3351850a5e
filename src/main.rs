use anyhow::Result;
use campaign_calendar::cli::{Cli, CliHandler};
use clap::Parser;
use tracing::Level;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_max_level(if cli.debug { Level::DEBUG } else { Level::INFO })
        .init();

    let handler = CliHandler::new(cli.config)?;
    handler.handle_command(cli.command).await
}
