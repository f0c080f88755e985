//! Command-line surface of the `concord` binary.

pub mod vault_cmd;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "concord",
    about = "Server core of a multi-agent Diplomacy match runner",
    version
)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the match server.
    Serve,
    /// Manage the credential vault.
    Vault {
        #[command(subcommand)]
        command: VaultCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum VaultCommand {
    /// Create a new vault file.
    Init,
    /// Store (or overwrite) a named secret.
    Set {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// List secret names and metadata.
    List,
    /// Remove a named secret.
    Remove { name: String },
    /// Change the master password (re-wraps only the DEK).
    RotatePassword,
}
