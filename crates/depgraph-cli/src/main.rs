//! depgraph CLI - Repository dependency graphs
//!
//! A command-line interface for building a component-level dependency graph
//! of a repository, keeping it current with incremental updates, and
//! querying it.
//!
//! # Usage
//!
//! ```bash
//! # Build the graph of the current directory
//! depgraph generate
//!
//! # Clone a remote repository and build its graph as SQLite
//! depgraph --repo https://github.com/org/project.git generate --format sqlite
//!
//! # Apply the changes since the last run
//! depgraph update
//!
//! # Who calls this function?
//! depgraph deps app.utils.format_name --reverse
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use depgraph_config::{DepGraphConfig, LogFormat};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;
mod progress;

/// depgraph - Build and incrementally update repository dependency graphs
#[derive(Parser, Debug)]
#[command(name = "depgraph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
struct GlobalOptions {
    /// Repository to operate on (local path or clone URL)
    #[arg(long, short = 'r', global = true, env = "DEPGRAPH_REPO")]
    repo: Option<String>,

    /// Path to configuration file
    #[arg(long, short = 'c', global = true, env = "DEPGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the dependency graph from scratch
    Generate(commands::generate::GenerateArgs),

    /// Update the stored graph with the changes since it was built
    Update(commands::update::UpdateArgs),

    /// Show summary statistics of the stored graph
    Stats(commands::stats::StatsArgs),

    /// List the dependencies or dependents of a component
    Deps(commands::deps::DepsArgs),

    /// View and manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),
}

fn init_tracing(global: &GlobalOptions, config: &DepGraphConfig) -> Result<()> {
    let log_level = if global.quiet {
        Level::ERROR
    } else if global.verbose {
        Level::DEBUG
    } else {
        config.logging.level.parse().unwrap_or(Level::INFO)
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    if global.json_logs || config.logging.format == LogFormat::Json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.with_ansi(true).finish())?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = commands::load_config(&cli.global)?;
    init_tracing(&cli.global, &config)?;

    match cli.command {
        Commands::Generate(args) => commands::generate::execute(args, cli.global, config).await,
        Commands::Update(args) => commands::update::execute(args, cli.global, config).await,
        Commands::Stats(args) => commands::stats::execute(args, cli.global, config).await,
        Commands::Deps(args) => commands::deps::execute(args, cli.global, config).await,
        Commands::Config(cmd) => commands::config::execute(cmd, cli.global, config).await,
    }
}
