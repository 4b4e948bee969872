use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use crate::config::parse_bool_env;

pub const ENV_OBSERVABILITY_ENABLED: &str = "PODWATCH_OBSERVABILITY_ENABLED";
pub const ENV_OBSERVABILITY: &str = "PODWATCH_OBSERVABILITY";
pub const ENV_LOG_LEVEL: &str = "PODWATCH_LOG_LEVEL";
pub const ENV_JSON_LOG_PATH: &str = "PODWATCH_JSON_LOG_PATH";

const DEFAULT_LOG_FILE: &str = "podwatch.logs.jsonl";

static INIT: OnceCell<()> = OnceCell::new();

fn observability_enabled_from<F>(lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    for key in [ENV_OBSERVABILITY_ENABLED, ENV_OBSERVABILITY] {
        if let Some(value) = lookup(key) {
            return parse_bool_env(&value).unwrap_or(true);
        }
    }
    true
}

fn resolve_env_filter() -> tracing_subscriber::EnvFilter {
    if let Ok(level) = std::env::var(ENV_LOG_LEVEL)
        && let Ok(filter) = tracing_subscriber::EnvFilter::try_new(level)
    {
        return filter;
    }
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

/// Split a log path into (directory, file name) for the file appender.
fn split_log_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE)
        .to_string();
    (dir, file_name)
}

/// Initialize logging once per process.
///
/// Environment variables:
/// - `PODWATCH_OBSERVABILITY_ENABLED` / `PODWATCH_OBSERVABILITY`: optional enable/disable flag (default enabled).
/// - `PODWATCH_LOG_LEVEL`: optional level/filter override (`info`, `debug`, etc.).
/// - `PODWATCH_JSON_LOG_PATH`: optional log file path. If set, logs are JSONL in that file.
///   If unset, logs are emitted to stdout in a human-readable console format.
/// - `RUST_LOG`: optional filter override.
pub fn init_observability() {
    INIT.get_or_init(|| {
        if !observability_enabled_from(|key| std::env::var(key).ok()) {
            return;
        }

        let env_filter = resolve_env_filter();
        if let Ok(path_raw) = std::env::var(ENV_JSON_LOG_PATH) {
            let (dir, file_name) = split_log_path(&PathBuf::from(path_raw));
            let _ = std::fs::create_dir_all(&dir);
            let writer = tracing_appender::rolling::never(dir, file_name);
            let json_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_target(false)
                .with_writer(writer);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(json_layer)
                .try_init();
        } else {
            let console_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stdout);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .try_init();
        }
    });
}
