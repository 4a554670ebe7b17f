//! vmsched CLI - stand-in producer for a running agent
//!
//! The simulator normally owns the producer side of the exchange. This CLI
//! plays that role for debugging: submit states, wait for decisions, inspect
//! or clean the exchange directory.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_precision_loss)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vmsched_agent::config::ENV_PREFIX;
use vmsched_agent::Config;
use vmsched_core::util::load_env_file;
use vmsched_core::{FileChannel, Producer};

mod commands;

use commands::{exchange, simulate};

#[derive(Parser)]
#[command(name = "vmsched")]
#[command(author, version, about = "vmsched - talk to a running placement agent", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Agent configuration file (same lookup as vmsched-agent when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Exchange directory shared with the agent (overrides exchange.dir)
    #[arg(short, long, global = true)]
    dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit one state and wait for the agent's decision
    Submit(exchange::SubmitArgs),

    /// Drive a batch of random tasks through the agent
    Simulate(simulate::SimulateArgs),

    /// Show which exchange files exist
    Status,

    /// Remove every exchange file
    Clean,
}

fn main() -> Result<()> {
    load_env_file();

    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("vmsched_cli={log_level},vmsched_core={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match &cli.config {
        Some(path) => Config::load_from(Some(path.as_path()), ENV_PREFIX)?,
        None => Config::load()?,
    };
    let producer = producer_for(&config, cli.dir.as_deref())?;

    match cli.command {
        Commands::Submit(args) => exchange::submit(&producer, &args),
        Commands::Simulate(args) => simulate::run(&producer, &args),
        Commands::Status => exchange::status(&producer),
        Commands::Clean => exchange::clean(&producer),
    }
}

/// Build the producer over the same directory and file names the agent uses
fn producer_for(config: &Config, dir: Option<&Path>) -> Result<Producer> {
    let dir = dir.unwrap_or(config.exchange.dir.as_path());
    let channel = FileChannel::new(dir, config.exchange.channel_names())
        .context("Invalid exchange file names")?;
    Ok(Producer::new(channel))
}
