//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod digest;
mod records;

pub use digest::DigestCommands;
pub use records::RecordCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Digest job management
    Digest {
        #[command(subcommand)]
        command: DigestCommands,
    },
    /// Corpus record maintenance
    Records {
        #[command(subcommand)]
        command: RecordCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Digest { command } => digest::handle_digest_command(command, config).await,
        Commands::Records { command } => records::handle_record_command(command, config).await,
    }
}
