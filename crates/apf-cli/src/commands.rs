//! CLI command definitions.

use clap::{Subcommand, ValueEnum};

#[derive(Subcommand)]
pub enum Commands {
    /// Run the metering API server
    Serve {
        /// Override the configured bind address
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Manage API credentials
    Key {
        #[command(subcommand)]
        command: KeyCommands,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum KeyCommands {
    /// Generate demo API credentials
    Generate {
        /// Tier: free, pro or enterprise
        #[arg(short, long, default_value = "free")]
        tier: String,

        /// Number of credentials
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show {
        #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Yaml,
    Json,
}
