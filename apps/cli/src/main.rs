mod commands;
mod core;

use clap::{Parser, Subcommand};
use commands::history::HistoryCommand;
use commands::install::InstallCommand;
use commands::remove::RemoveCommand;
use commands::undo::UndoCommand;
use commands::validate::ValidateCommand;
use commands::versions::VersionsCommand;
use crate::core::context::CliContext;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "env-forge")]
#[command(about = "Provision, audit, and reversibly mutate your developer environment", long_about = None)]
struct Cli {
    /// Override the per-user state directory
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install an app after validating the plugins it requires
    Install(InstallCommand),
    /// Remove an app, gated by conflict detection
    Remove(RemoveCommand),
    /// Validate plugins without changing any state
    Validate(ValidateCommand),
    /// Undo a recorded operation from its backup
    Undo(UndoCommand),
    /// Show the mutation journal
    History(HistoryCommand),
    /// Show the version history
    Versions(VersionsCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        crate::core::error::render(&err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx = CliContext::open(cli.state_dir)?;

    match cli.command {
        Commands::Install(cmd) => cmd.execute(&ctx).await,
        Commands::Remove(cmd) => cmd.execute(&ctx).await,
        Commands::Validate(cmd) => cmd.execute(&ctx).await,
        Commands::Undo(cmd) => cmd.execute(&ctx).await,
        Commands::History(cmd) => cmd.execute(&ctx).await,
        Commands::Versions(cmd) => cmd.execute(&ctx).await,
    }
}
