use clap::Parser;

mod adapter;
mod api;
mod bootstrap;
mod cli;
mod state;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    match cli.command {
        Command::Serve => bootstrap::serve(cli.config.as_deref()).await,
        Command::Vault { command } => cli::vault_cmd::run(command, cli.config.as_deref()),
    }
}
