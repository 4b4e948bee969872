//! Watcher configuration: builder defaults, environment variables and `.env` files.
//!
//! Environment variables:
//! - `PODWATCH_WAIT_FOR_COMPLETION`: block until the pod finishes (default `true`).
//! - `PODWATCH_REPORT_INTERVAL_MS`: heartbeat interval while waiting (default `1000`, must be > 0).
//! - `PODWATCH_APP_NAME`: display name used in log lines (default `podwatch`).
//! - `PODWATCH_APP_ID`: application id (default `app-<random uuid>`).
//! - `PODWATCH_MAX_RESUBSCRIBES`: bound on stale-version resubscriptions (default unbounded).

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConfigError;

pub const ENV_WAIT_FOR_COMPLETION: &str = "PODWATCH_WAIT_FOR_COMPLETION";
pub const ENV_REPORT_INTERVAL_MS: &str = "PODWATCH_REPORT_INTERVAL_MS";
pub const ENV_APP_NAME: &str = "PODWATCH_APP_NAME";
pub const ENV_APP_ID: &str = "PODWATCH_APP_ID";
pub const ENV_MAX_RESUBSCRIBES: &str = "PODWATCH_MAX_RESUBSCRIBES";

const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_APP_NAME: &str = "podwatch";

pub(crate) fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

fn generate_app_id() -> String {
    format!("app-{}", Uuid::new_v4().simple())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// When false, `wait_or_stop` returns immediately after logging a deploy notice.
    #[serde(default = "default_wait_for_completion")]
    pub wait_for_completion: bool,
    #[serde(default = "default_report_interval", with = "duration_ms")]
    pub report_interval: Duration,
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "generate_app_id")]
    pub app_id: String,
    #[serde(default)]
    pub max_resubscribes: Option<u32>,
}

fn default_wait_for_completion() -> bool {
    true
}

fn default_report_interval() -> Duration {
    DEFAULT_REPORT_INTERVAL
}

fn default_app_name() -> String {
    DEFAULT_APP_NAME.to_string()
}

mod duration_ms {
    use std::time::Duration;

    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis())
            .map_err(|_| S::Error::custom(format!("duration {value:?} overflows u64 milliseconds")))?;
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            wait_for_completion: default_wait_for_completion(),
            report_interval: DEFAULT_REPORT_INTERVAL,
            app_name: default_app_name(),
            app_id: generate_app_id(),
            max_resubscribes: None,
        }
    }
}

impl WatcherConfig {
    pub fn new(app_name: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            app_id: app_id.into(),
            ..Self::default()
        }
    }

    pub fn with_wait_for_completion(mut self, wait: bool) -> Self {
        self.wait_for_completion = wait;
        self
    }

    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    pub fn with_max_resubscribes(mut self, max: Option<u32>) -> Self {
        self.max_resubscribes = max;
        self
    }

    /// Build a config from a key lookup. Missing keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_WAIT_FOR_COMPLETION) {
            config.wait_for_completion = parse_bool_env(&raw)
                .ok_or_else(|| ConfigError::invalid(ENV_WAIT_FOR_COMPLETION, &raw, "expected a boolean"))?;
        }
        if let Some(raw) = lookup(ENV_REPORT_INTERVAL_MS) {
            let millis: u64 = raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::invalid(ENV_REPORT_INTERVAL_MS, &raw, e.to_string())
            })?;
            if millis == 0 {
                return Err(ConfigError::invalid(
                    ENV_REPORT_INTERVAL_MS,
                    &raw,
                    "must be greater than zero",
                ));
            }
            config.report_interval = Duration::from_millis(millis);
        }
        if let Some(raw) = lookup(ENV_APP_NAME).filter(|v| !v.trim().is_empty()) {
            config.app_name = raw.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_APP_ID).filter(|v| !v.trim().is_empty()) {
            config.app_id = raw.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_MAX_RESUBSCRIBES) {
            let max: u32 = raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::invalid(ENV_MAX_RESUBSCRIBES, &raw, e.to_string())
            })?;
            config.max_resubscribes = Some(max);
        }
        Ok(config)
    }

    /// Load `.env` (if present) into the process environment, then read the config from it.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the config from an env file layered over the process environment.
    /// The file wins; the process environment is not modified.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let env_file_error = |e: dotenvy::Error| ConfigError::EnvFile {
            path: path.display().to_string(),
            message: e.to_string(),
        };
        let mut file_vars = HashMap::new();
        for item in dotenvy::from_path_iter(path).map_err(env_file_error)? {
            let (key, value) = item.map_err(env_file_error)?;
            file_vars.insert(key, value);
        }
        Self::from_lookup(|key| {
            file_vars
                .get(key)
                .cloned()
                .or_else(|| std::env::var(key).ok())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = WatcherConfig::from_lookup(|_| None).unwrap();
        assert!(config.wait_for_completion);
        assert_eq!(config.report_interval, Duration::from_secs(1));
        assert_eq!(config.app_name, "podwatch");
        assert!(config.app_id.starts_with("app-"));
        assert_eq!(config.max_resubscribes, None);
    }

    #[test]
    fn reads_all_keys() {
        let config = WatcherConfig::from_lookup(lookup_from(&[
            (ENV_WAIT_FOR_COMPLETION, "off"),
            (ENV_REPORT_INTERVAL_MS, "250"),
            (ENV_APP_NAME, " nightly-etl "),
            (ENV_APP_ID, "app-42"),
            (ENV_MAX_RESUBSCRIBES, "3"),
        ]))
        .unwrap();
        assert!(!config.wait_for_completion);
        assert_eq!(config.report_interval, Duration::from_millis(250));
        assert_eq!(config.app_name, "nightly-etl");
        assert_eq!(config.app_id, "app-42");
        assert_eq!(config.max_resubscribes, Some(3));
    }

    #[test]
    fn bool_parsing_accepts_common_spellings() {
        for raw in ["1", "true", "YES", "on"] {
            assert_eq!(parse_bool_env(raw), Some(true), "{raw}");
        }
        for raw in ["0", "false", "No", "off"] {
            assert_eq!(parse_bool_env(raw), Some(false), "{raw}");
        }
        assert_eq!(parse_bool_env("maybe"), None);
    }

    #[test]
    fn rejects_zero_and_garbage_intervals() {
        let err = WatcherConfig::from_lookup(lookup_from(&[(ENV_REPORT_INTERVAL_MS, "0")]))
            .unwrap_err();
        assert!(err.to_string().contains("greater than zero"));

        let err = WatcherConfig::from_lookup(lookup_from(&[(ENV_REPORT_INTERVAL_MS, "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == ENV_REPORT_INTERVAL_MS));

        let err = WatcherConfig::from_lookup(lookup_from(&[(ENV_WAIT_FOR_COMPLETION, "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_WAIT_FOR_COMPLETION));
    }

    #[test]
    fn env_file_values_are_read_without_touching_process_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watch.env");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "PODWATCH_APP_NAME=from-file").unwrap();
        writeln!(file, "PODWATCH_REPORT_INTERVAL_MS=50").unwrap();
        drop(file);

        let config = WatcherConfig::from_env_file(&path).unwrap();
        assert_eq!(config.app_name, "from-file");
        assert_eq!(config.report_interval, Duration::from_millis(50));
        assert!(std::env::var(ENV_REPORT_INTERVAL_MS).is_err());
    }

    #[test]
    fn from_env_falls_back_to_defaults() {
        let config = WatcherConfig::from_env().unwrap();
        assert_eq!(config.app_name, "podwatch");
        assert!(config.wait_for_completion);
    }

    #[test]
    fn missing_env_file_is_an_error() {
        let err = WatcherConfig::from_env_file("/nonexistent/podwatch.env").unwrap_err();
        assert!(matches!(err, ConfigError::EnvFile { .. }));
    }

    #[test]
    fn serde_uses_millis_and_defaults() {
        let config: WatcherConfig =
            serde_json::from_value(serde_json::json!({ "report_interval": 200, "app_id": "a1" }))
                .unwrap();
        assert_eq!(config.report_interval, Duration::from_millis(200));
        assert_eq!(config.app_id, "a1");
        assert!(config.wait_for_completion);
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["report_interval"], serde_json::json!(200));
    }

    #[test]
    fn oversized_interval_fails_to_serialize() {
        let config = WatcherConfig::new("etl", "a1").with_report_interval(Duration::MAX);
        let err = serde_json::to_string(&config).unwrap_err();
        assert!(err.to_string().contains("overflows u64 milliseconds"));
    }
}
