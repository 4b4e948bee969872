use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use podwatch_core::{ConfigError, WatcherConfig};

/// Watch a driver pod (replayed from a scenario file) until it finishes.
#[derive(Debug, Parser)]
#[command(name = "podwatch", version)]
pub struct Args {
    /// JSON scenario with the initial pod and the recorded watch sessions.
    #[arg(long)]
    pub scenario: PathBuf,

    /// Name of the watched driver pod.
    #[arg(long, default_value = "driver")]
    pub resource: String,

    /// Namespace, used to build the default submission id.
    #[arg(long, default_value = "default")]
    pub namespace: String,

    /// Submission id; defaults to `<namespace>:<resource>`.
    #[arg(long)]
    pub submission_id: Option<String>,

    /// Return right after subscribing instead of waiting for completion.
    #[arg(long)]
    pub no_wait: bool,

    #[arg(long)]
    pub report_interval_ms: Option<u64>,

    #[arg(long)]
    pub app_name: Option<String>,

    #[arg(long)]
    pub app_id: Option<String>,

    /// Give up after this many stale-version resubscriptions.
    #[arg(long)]
    pub max_resubscribes: Option<u32>,

    /// Env file to read watcher settings from instead of `./.env`. Its values win over the
    /// process environment, which is left unchanged.
    #[arg(long)]
    pub env_file: Option<PathBuf>,
}

impl Args {
    pub fn submission_id(&self) -> String {
        self.submission_id
            .clone()
            .unwrap_or_else(|| format!("{}:{}", self.namespace, self.resource))
    }

    /// `--env-file` (or `./.env` plus the process environment) first, then flags on top.
    pub fn watcher_config(&self) -> Result<WatcherConfig, ConfigError> {
        let mut config = match &self.env_file {
            Some(path) => WatcherConfig::from_env_file(path)?,
            None => WatcherConfig::from_env()?,
        };
        if self.no_wait {
            config.wait_for_completion = false;
        }
        if let Some(ms) = self.report_interval_ms {
            if ms == 0 {
                return Err(ConfigError::Invalid {
                    key: "--report-interval-ms".into(),
                    value: ms.to_string(),
                    reason: "must be greater than zero".into(),
                });
            }
            config.report_interval = Duration::from_millis(ms);
        }
        if let Some(name) = &self.app_name {
            config.app_name = name.clone();
        }
        if let Some(id) = &self.app_id {
            config.app_id = id.clone();
        }
        if let Some(max) = self.max_resubscribes {
            config.max_resubscribes = Some(max);
        }
        Ok(config)
    }
}
