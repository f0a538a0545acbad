use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use hookbot::logging::{self, LogHandle};
use hookbot::Config;

mod cli;

#[derive(Parser)]
#[command(name = "hookbot")]
#[command(about = "Lean, hook-driven IRC bot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the configured server and run the bot
    Run {
        /// Bot directory holding config.json and plugins/
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },
    /// List the plugins that would load, without connecting
    Plugins {
        /// Bot directory holding config.json and plugins/
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },
    /// Print the effective configuration
    Config {
        /// Bot directory holding config.json
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },
    /// Show version information
    Version,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) | None => {
            println!("hookbot {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Run { path }) => {
            let (config, log) = load_config(&path)?;
            cli::run::cmd_run(path, config, log)?;
        }
        Some(Commands::Plugins { path }) => {
            let (config, _log) = load_config(&path)?;
            cli::plugins::cmd_plugins(path, config)?;
        }
        Some(Commands::Config { path }) => {
            let (config, _log) = load_config(&path)?;
            let rendered = serde_json::to_string_pretty(&config.to_value())
                .context("Failed to render configuration")?;
            println!("{}", rendered);
        }
    }

    Ok(())
}

/// Read `<path>/config.json`, install the configured log subscriber, then
/// report how the configuration was loaded.
fn load_config(path: &Path) -> Result<(Config, LogHandle)> {
    let (config, outcome) = Config::load(path);
    let log = logging::init(&config.log_settings()).context("Failed to initialise logging")?;
    outcome.log();
    Ok((config, log))
}
