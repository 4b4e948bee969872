pub mod config;
pub mod error;
pub mod monitor;
pub mod observability;
pub mod resource;
pub mod sink;
pub mod source;
pub mod state;
pub mod watcher;

// Minimal user-facing API: watcher, config, sinks, the event-source contract and the monitor loop.
pub use config::WatcherConfig;
pub use error::{ConfigError, MonitorError, SourceError};
pub use monitor::{monitor_submission, monitor_submission_async};
pub use resource::PodSnapshot;
pub use sink::{LoggingStateSink, RecordingStateSink, StateSink};
pub use source::{EventSource, StreamError, Subscription, WatchAction, WatchHandler};
pub use state::AppState;
pub use watcher::ResourceStatusWatcher;
