//! vmsched Agent - VM placement decisions for an external simulator
//!
//! Watches the exchange directory for workload states, picks a VM with an
//! epsilon-greedy policy over a Q-network, and publishes the choice.

// Pedantic clippy allows - intentional design decisions for this crate:
// - doc_markdown: identifiers in docs read fine without backticks
// - if_not_else: "if !x.is_empty()" is often more readable than inverted branches
#![allow(clippy::doc_markdown)]
#![allow(clippy::if_not_else)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vmsched_agent::{Config, DecisionLoop, LoopSettings};
use vmsched_core::util::load_env_file;
use vmsched_core::FileChannel;
use vmsched_rl::{EpsilonGreedy, QNetwork};

/// Reinforcement-learning VM placement agent
#[derive(Parser, Debug)]
#[command(name = "vmsched-agent")]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file (defaults to VMSCHED_CONFIG, ./vmsched.toml, ~/.config/vmsched/vmsched.toml)
    #[arg(short, long, env = "VMSCHED_CONFIG")]
    config: Option<PathBuf>,

    /// Exchange directory shared with the simulator
    #[arg(short = 'd', long)]
    exchange_dir: Option<PathBuf>,

    /// Exploration probability
    #[arg(short, long)]
    epsilon: Option<f64>,

    /// Number of VMs (must match the simulator)
    #[arg(short, long)]
    action_dim: Option<usize>,

    /// Seed for network init and exploration
    #[arg(long)]
    seed: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.exchange_dir {
            config.exchange.dir.clone_from(dir);
        }
        if let Some(epsilon) = self.epsilon {
            config.policy.epsilon = epsilon;
            config.policy.min_epsilon = config.policy.min_epsilon.min(epsilon);
        }
        if let Some(action_dim) = self.action_dim {
            config.policy.action_dim = action_dim;
        }
        if self.seed.is_some() {
            config.policy.seed = self.seed;
        }
        if self.verbose {
            config.agent.log_level = "debug".to_string();
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    load_env_file();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(Some(path.as_path()), vmsched_agent::config::ENV_PREFIX)?,
        None => Config::load()?,
    };
    args.apply(&mut config);
    config.validate()?;

    if args.print_config {
        print!("{}", toml::to_string(&config)?);
        return Ok(());
    }

    let _log_guard = init_logging(&config);

    info!("Starting vmsched agent v{}", env!("CARGO_PKG_VERSION"));

    let channel = FileChannel::new(&config.exchange.dir, config.exchange.channel_names())
        .context("Invalid exchange channel")?;
    let estimator = QNetwork::seeded(
        config.policy.action_dim,
        config.policy.hidden_dim,
        config.policy.seed,
    )?;
    // Offset so exploration draws don't replay the weight init stream
    let policy_seed = config.policy.seed.map(|s| s.wrapping_add(1));
    let policy = EpsilonGreedy::new(config.policy.action_dim, config.policy.schedule()?, policy_seed)?;

    let shape = estimator.shape();
    info!(
        "Agent initialized: {} VMs, epsilon={}, network {}x{}x{} ({} parameters)",
        config.policy.action_dim,
        config.policy.epsilon,
        shape.input_dim,
        shape.hidden_dim,
        shape.output_dim,
        shape.parameters
    );
    match config.exchange.max_request_failures {
        Some(limit) => info!("Malformed requests quarantined after {} attempts", limit),
        None => warn!("Malformed requests are retried indefinitely"),
    }
    info!(
        "Waiting for simulator state observations in {:?}",
        channel.dir()
    );

    let mut decision_loop = DecisionLoop::new(channel, estimator, policy, LoopSettings::from(&config))?;

    tokio::select! {
        () = decision_loop.run() => {}
        () = shutdown_signal() => {}
    }

    let stats = decision_loop.policy().stats();
    info!(
        "vmsched agent stopped after {} decisions ({} explored, {} exploited)",
        stats.decisions, stats.explorations, stats.exploitations
    );
    Ok(())
}

/// Split `agent.log_file` into the directory and file name the appender wants
fn log_target(log_file: &str) -> (PathBuf, String) {
    let path = Path::new(log_file);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("vmsched-agent.log")
        .to_string();
    (dir, name)
}

fn file_appender(log_file: &str) -> Result<RollingFileAppender> {
    let (dir, name) = log_target(log_file);
    std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name)
        .build(&dir)
        .with_context(|| format!("Failed to open log file in {}", dir.display()))
}

/// Initialize tracing, teeing to a file when `agent.log_file` is set.
/// The returned guard flushes the file writer on drop.
fn init_logging(config: &Config) -> Option<WorkerGuard> {
    let level = &config.agent.log_level;
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("vmsched_agent={level},vmsched_core={level},vmsched_rl={level}").into()
    });

    let appender = if config.agent.log_file.is_empty() {
        None
    } else {
        Some(file_appender(&config.agent.log_file))
    };

    match appender {
        Some(Ok(appender)) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
                .with(tracing_subscriber::fmt::layer())
                .init();
            info!("Logging to file: {}", config.agent.log_file);
            Some(guard)
        }
        Some(Err(e)) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
            warn!("File logging disabled, using stdout only: {:#}", e);
            None
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
            None
        }
    }
}

/// Resolve on SIGINT, or SIGTERM on unix
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
                return;
            }
            Err(e) => error!("SIGTERM handler unavailable, Ctrl+C only: {}", e),
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received SIGINT"),
        Err(e) => {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
