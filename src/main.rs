use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use skywatch::commands;
use skywatch::log_format::TargetFirstFormat;
use skywatch::settings::Settings;

#[derive(Parser)]
#[command(name = "skywatch", about = "Aviation telemetry ingestion and fan-out")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the ingestion pipeline
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .event_format(TargetFirstFormat)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run => {
            let settings = Settings::from_env()?;
            commands::handle_run(settings).await
        }
    }
}
