//! CLI interface for odds-pipeline
//!
//! Provides subcommands for:
//! - `run`: Poll sources and detect movement, arbitrage and sharp action
//! - `replay`: Replay captured quotes through a fresh pipeline
//! - `config`: Show configuration

mod replay;
mod run;

pub use replay::{replay_quotes, GameReplay, ReplayArgs};
pub use run::RunArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "odds-pipeline")]
#[command(about = "Betting-odds collection, line movement and arbitrage detection")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll configured sources until interrupted
    Run(RunArgs),
    /// Replay captured quotes
    Replay(ReplayArgs),
    /// Show configuration
    Config,
}
