//! Configuration loading for the agent

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};

use vmsched_core::ChannelNames;
use vmsched_rl::EpsilonSchedule;

/// Prefix for environment overrides, e.g. `VMSCHED__POLICY__EPSILON=0.1`
pub const ENV_PREFIX: &str = "VMSCHED";

/// Configuration for the agent
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub agent: AgentConfig,
    pub exchange: ExchangeConfig,
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentConfig {
    pub log_level: String,
    /// Log file path; empty logs to stdout only
    pub log_file: String,
    /// Log policy statistics every N decisions (0 disables)
    pub stats_interval: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_file: String::new(),
            stats_interval: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub dir: PathBuf,
    pub request_file: String,
    pub response_file: String,
    pub staging_file: String,
    pub quarantine_file: String,
    pub idle_delay_ms: u64,
    pub error_backoff_ms: u64,
    /// Quarantine a request after this many consecutive malformed reads.
    /// Unset retries forever.
    pub max_request_failures: Option<u32>,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        let names = ChannelNames::default();
        Self {
            dir: PathBuf::from("."),
            request_file: names.request,
            response_file: names.response,
            staging_file: names.staging,
            quarantine_file: names.quarantine,
            idle_delay_ms: 10,
            error_backoff_ms: 100,
            max_request_failures: None,
        }
    }
}

impl ExchangeConfig {
    pub fn channel_names(&self) -> ChannelNames {
        ChannelNames {
            request: self.request_file.clone(),
            response: self.response_file.clone(),
            staging: self.staging_file.clone(),
            quarantine: self.quarantine_file.clone(),
        }
    }

    pub fn idle_delay(&self) -> Duration {
        Duration::from_millis(self.idle_delay_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Number of VMs; must match the simulator
    pub action_dim: usize,
    pub epsilon: f64,
    pub epsilon_decay: f64,
    pub min_epsilon: f64,
    pub hidden_dim: usize,
    /// Seed for network init and exploration draws
    pub seed: Option<u64>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            action_dim: 5,
            epsilon: 1.0,
            epsilon_decay: 1.0,
            min_epsilon: 0.0,
            hidden_dim: 128,
            seed: None,
        }
    }
}

impl PolicyConfig {
    pub fn schedule(&self) -> Result<EpsilonSchedule> {
        EpsilonSchedule::new(self.epsilon, self.epsilon_decay, self.min_epsilon)
            .context("Invalid epsilon schedule")
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        Self::load_from(Self::find_config_file().as_deref(), ENV_PREFIX)
    }

    /// Load from an explicit file (if any) with the given environment prefix
    pub fn load_from(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let mut builder = ConfigBuilder::<config::builder::DefaultState>::default();

        if let Some(path) = path {
            tracing::info!("Loading config from: {:?}", path);
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        } else {
            tracing::info!("No config file found, using defaults");
        }

        builder = builder.add_source(
            Environment::with_prefix(env_prefix)
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder
            .build()?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the agent cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.policy.action_dim == 0 {
            bail!("policy.action_dim must be at least 1");
        }
        if self.policy.hidden_dim == 0 {
            bail!("policy.hidden_dim must be at least 1");
        }
        self.policy.schedule()?;
        if self.exchange.max_request_failures == Some(0) {
            bail!("exchange.max_request_failures must be at least 1 when set");
        }
        self.exchange
            .channel_names()
            .validate()
            .context("Invalid exchange file names")?;
        Ok(())
    }

    /// Find the configuration file
    fn find_config_file() -> Option<PathBuf> {
        // Check in order: VMSCHED_CONFIG env, ./vmsched.toml, ~/.config/vmsched/vmsched.toml
        if let Ok(path) = std::env::var("VMSCHED_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let local = PathBuf::from("vmsched.toml");
        if local.exists() {
            return Some(local);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".config").join("vmsched").join("vmsched.toml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }
}
