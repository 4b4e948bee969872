//! Event-source contract: how pod notifications reach a watcher.
//!
//! An [`EventSource`] delivers to a [`WatchHandler`] through two callbacks:
//! `event_received` for every added/modified/deleted/error notification and `on_close`
//! once the subscription ends. A close carrying [`StreamError::Gone`] means the resume
//! cursor expired and the caller should resubscribe rather than treat the pod as done.

pub mod scripted;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::resource::PodSnapshot;

pub use scripted::{Scenario, ScenarioError, ScriptStep, ScriptedEventSource};

/// HTTP status the API uses when a watch resource version is too old.
pub const HTTP_GONE: u16 = 410;

/// Action tag carried by each watch notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchAction {
    Added,
    Modified,
    Deleted,
    Error,
    Bookmark,
}

impl WatchAction {
    /// Deleted and Error end the session regardless of the pod phase.
    pub fn ends_session(&self) -> bool {
        matches!(self, WatchAction::Deleted | WatchAction::Error)
    }
}

/// Error a watch stream closed with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamError {
    /// Resource version cursor expired (HTTP 410).
    #[error("resource version too old (HTTP 410): {message}")]
    Gone { message: String },
    #[error("watch stream failed: {message}")]
    Failed {
        #[serde(default)]
        status_code: Option<u16>,
        message: String,
    },
}

impl StreamError {
    pub fn from_status(status_code: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        match status_code {
            Some(HTTP_GONE) => StreamError::Gone { message },
            _ => StreamError::Failed {
                status_code,
                message,
            },
        }
    }

    pub fn is_http_gone(&self) -> bool {
        matches!(self, StreamError::Gone { .. })
    }
}

/// Receiver side of a watch subscription.
pub trait WatchHandler: Send + Sync {
    fn event_received(&self, action: WatchAction, resource: Option<PodSnapshot>);

    /// Called once when the subscription ends; `None` is a normal close.
    fn on_close(&self, error: Option<StreamError>);
}

/// Handle to a live subscription. Closing stops further delivery.
pub trait Subscription: Send {
    fn close(self: Box<Self>);
}

/// Subscription provider for a single named pod.
pub trait EventSource: Send + Sync {
    /// Current state of the pod, if it exists.
    fn get(&self, name: &str) -> Result<Option<PodSnapshot>, SourceError>;

    fn watch(
        &self,
        name: &str,
        handler: Arc<dyn WatchHandler>,
    ) -> Result<Box<dyn Subscription>, SourceError>;
}
