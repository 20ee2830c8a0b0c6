//! Apple Farm metering CLI entrypoint.

use clap::Parser;
use std::path::PathBuf;

mod commands;
mod config;
mod handlers;

use commands::{Commands, ConfigCommands, KeyCommands};
use config::ServerConfig;

#[derive(Parser)]
#[command(name = "apf")]
#[command(author, version, about = "Apple Farm API metering and billing", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./apf.yaml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = ServerConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind_address = bind;
                config.validate()?;
            }
            apf_trace::init_tracer(&config.tracing)?;
            let result = handlers::serve(&config).await;
            apf_trace::shutdown_tracer();
            result?
        }
        Commands::Key { command } => match command {
            KeyCommands::Generate { tier, count } => handlers::generate_keys(&tier, count)?,
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show { format } => handlers::show_config(&config, format)?,
        },
    }

    Ok(())
}
