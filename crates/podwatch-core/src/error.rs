use thiserror::Error;

/// Failure reported by an [`EventSource`](crate::source::EventSource) while subscribing or fetching.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to watch {resource}: {message}")]
    Watch { resource: String, message: String },
    #[error("failed to get {resource}: {message}")]
    Get { resource: String, message: String },
    #[error("no more watch sessions available for {0}")]
    Exhausted(String),
}

/// Failure of the resubscribing monitor loop.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("event source error: {0}")]
    Source(#[from] SourceError),
    #[error("resource version still stale after {0} resubscriptions")]
    ResubscribeLimit(u32),
    #[error("blocking wait task failed: {0}")]
    Join(String),
}

/// Invalid watcher configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
    #[error("failed to read env file {path}: {message}")]
    EnvFile { path: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
