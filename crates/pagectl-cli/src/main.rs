use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pagectl_core::PageConfig;

mod commands;

#[derive(Parser)]
#[command(name = "pagectl")]
#[command(author, version, about = "Replay page scenarios against the pagectl controller")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ~/.config/pagectl/config.toml)
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario and print every presentation change
    Replay {
        /// Scenario file (.toml or .json)
        scenario: PathBuf,
        /// Run without intersection observation support
        #[arg(long)]
        degraded: bool,
        /// Print mutations as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    Config {
        /// Print only the configuration file path
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PageConfig::load_from(path)?,
        None => PageConfig::load()?,
    };

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match cli.command {
        Commands::Replay {
            scenario,
            degraded,
            json,
        } => {
            let options = commands::replay::ReplayOptions { degraded, json };
            commands::replay::run(&scenario, config, options).await
        }
        Commands::Config { path } => commands::config::run(&config, cli.config.as_deref(), path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_arguments() {
        let cli = Cli::try_parse_from(["pagectl", "replay", "demo.toml", "--degraded", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Replay {
                degraded: true,
                json: true,
                ..
            }
        ));
        assert!(Cli::try_parse_from(["pagectl", "replay", "demo.toml", "--realtime"]).is_err());
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["pagectl", "config", "--path", "--config", "custom.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert!(matches!(cli.command, Commands::Config { path: true }));
    }
}
