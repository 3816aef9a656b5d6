//! Command-line interface for rl-compose
//!
//! Provides `compose`, `check`, `list`, `targets` and `completions`
//! subcommands over a directory tree of YAML fragments.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod check;
mod compose;
mod list;
mod targets;
mod utils;

/// Compose layered YAML experiment configurations
#[derive(Parser)]
#[command(name = "rl-compose")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (sets log level to DEBUG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the composed configuration
    Compose(compose::ComposeArgs),

    /// Compose, resolve and validate a run, then print a report
    Check(check::CheckArgs),

    /// List available fragments per group
    List(list::ListArgs),

    /// List registered `_target_` identifiers
    Targets(targets::TargetsArgs),

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // Wire verbose flag to the tracing log level.
    // RUST_LOG in the environment always takes precedence; --verbose falls back to DEBUG.
    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    match cli.command {
        Commands::Compose(args) => compose::run(args),
        Commands::Check(args) => check::run(args),
        Commands::List(args) => list::run(args),
        Commands::Targets(args) => targets::run(args),
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "rl-compose", &mut std::io::stdout());
            Ok(())
        }
    }
}
