//! Scripted event source: replays pre-recorded watch sessions on a background thread.
//! Used by the CLI to drive the watcher from a JSON scenario and by tests.
//!
//! ```json
//! {
//!   "initial": { "metadata": { "name": "driver" }, "status": { "phase": "Pending" } },
//!   "sessions": [
//!     [
//!       { "kind": "event", "action": "modified", "pod": { "status": { "phase": "Running" } }, "delay_ms": 10 },
//!       { "kind": "close", "error": { "kind": "gone", "message": "too old resource version" } }
//!     ],
//!     [
//!       { "kind": "event", "action": "modified", "pod": { "status": { "phase": "Succeeded" } } }
//!     ]
//!   ]
//! }
//! ```

use std::any::Any;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::{EventSource, StreamError, Subscription, WatchAction, WatchHandler};
use crate::error::SourceError;
use crate::resource::PodSnapshot;

/// One step of a recorded watch session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScriptStep {
    Event {
        action: WatchAction,
        #[serde(default)]
        pod: Option<PodSnapshot>,
        #[serde(default)]
        delay_ms: u64,
    },
    Close {
        #[serde(default)]
        error: Option<StreamError>,
        #[serde(default)]
        delay_ms: u64,
    },
}

impl ScriptStep {
    pub fn event(action: WatchAction, pod: Option<PodSnapshot>) -> Self {
        ScriptStep::Event {
            action,
            pod,
            delay_ms: 0,
        }
    }

    pub fn close(error: Option<StreamError>) -> Self {
        ScriptStep::Close { error, delay_ms: 0 }
    }

    pub fn after(self, delay_ms: u64) -> Self {
        match self {
            ScriptStep::Event { action, pod, .. } => ScriptStep::Event {
                action,
                pod,
                delay_ms,
            },
            ScriptStep::Close { error, .. } => ScriptStep::Close { error, delay_ms },
        }
    }

    fn delay(&self) -> Duration {
        match self {
            ScriptStep::Event { delay_ms, .. } | ScriptStep::Close { delay_ms, .. } => {
                Duration::from_millis(*delay_ms)
            }
        }
    }
}

/// A full recording: the pod as `get` first sees it, then one step list per watch session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub initial: Option<PodSnapshot>,
    #[serde(default)]
    pub sessions: Vec<Vec<ScriptStep>>,
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse scenario {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl Scenario {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ScenarioError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

pub struct ScriptedEventSource {
    sessions: Mutex<VecDeque<Vec<ScriptStep>>>,
    current: Arc<Mutex<Option<PodSnapshot>>>,
}

impl ScriptedEventSource {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            sessions: Mutex::new(scenario.sessions.into()),
            current: Arc::new(Mutex::new(scenario.initial)),
        }
    }

    pub fn remaining_sessions(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn replay(
    name: String,
    steps: Vec<ScriptStep>,
    handler: Arc<dyn WatchHandler>,
    current: Arc<Mutex<Option<PodSnapshot>>>,
    closed: Arc<AtomicBool>,
) {
    for step in steps {
        let delay = step.delay();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if closed.load(Ordering::SeqCst) {
            debug!(event = "source.replay_cancelled", domain = "source", resource = %name);
            return;
        }
        match step {
            ScriptStep::Event { action, pod, .. } => {
                *current.lock().unwrap_or_else(PoisonError::into_inner) = pod.clone();
                handler.event_received(action, pod);
            }
            ScriptStep::Close { error, .. } => {
                handler.on_close(error);
                return;
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

struct ScriptedSubscription {
    closed: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Subscription for ScriptedSubscription {
    fn close(mut self: Box<Self>) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take()
            && let Err(panic) = worker.join()
        {
            warn!(
                event = "source.replay_panicked",
                domain = "source",
                panic = %panic_message(panic.as_ref())
            );
        }
    }
}

impl EventSource for ScriptedEventSource {
    fn get(&self, _name: &str) -> Result<Option<PodSnapshot>, SourceError> {
        Ok(self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn watch(
        &self,
        name: &str,
        handler: Arc<dyn WatchHandler>,
    ) -> Result<Box<dyn Subscription>, SourceError> {
        let steps = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| SourceError::Exhausted(name.to_string()))?;
        debug!(
            event = "source.watch_started",
            domain = "source",
            resource = %name,
            steps = steps.len() as u64
        );
        let closed = Arc::new(AtomicBool::new(false));
        let worker = std::thread::Builder::new()
            .name(format!("podwatch-replay-{name}"))
            .spawn({
                let name = name.to_string();
                let current = self.current.clone();
                let closed = closed.clone();
                move || replay(name, steps, handler, current, closed)
            })
            .map_err(|e| SourceError::Watch {
                resource: name.to_string(),
                message: e.to_string(),
            })?;
        Ok(Box::new(ScriptedSubscription {
            closed,
            worker: Some(worker),
        }))
    }
}
