//! Driver pod status watcher.
//!
//! [`ResourceStatusWatcher`] receives pod notifications from an event source, keeps the latest
//! snapshot, reports phase transitions to an optional [`StateSink`] (once per distinct phase)
//! and lets a caller block in [`wait_or_stop`](ResourceStatusWatcher::wait_or_stop) until the
//! pod reaches a terminal phase, the stream ends, or the resource version goes stale.
//!
//! All mutable state lives behind one mutex shared with a condition variable, so the stopping
//! check always sees a consistent pair of (completed, resource_too_old).

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, info};

use crate::config::WatcherConfig;
use crate::error::MonitorError;
use crate::resource::{PodSnapshot, containers_description, format_pod_state};
use crate::sink::StateSink;
use crate::source::{StreamError, WatchAction, WatchHandler};
use crate::state::{AppState, PHASE_NOT_OBSERVED, is_terminal_phase};

const MIN_WAIT: Duration = Duration::from_millis(1);

#[derive(Default)]
struct WatchState {
    pod: Option<PodSnapshot>,
    last_reported_phase: Option<String>,
    completed: bool,
    resource_too_old: bool,
    sink: Option<Arc<dyn StateSink>>,
}

impl WatchState {
    fn phase(&self) -> String {
        self.pod
            .as_ref()
            .and_then(|p| p.phase())
            .unwrap_or(PHASE_NOT_OBSERVED)
            .to_string()
    }

    fn should_stop(&self) -> bool {
        self.completed || self.resource_too_old
    }
}

pub struct ResourceStatusWatcher {
    config: WatcherConfig,
    state: Mutex<WatchState>,
    changed: Condvar,
}

impl ResourceStatusWatcher {
    pub fn new(config: WatcherConfig) -> Self {
        Self {
            config,
            state: Mutex::new(WatchState::default()),
            changed: Condvar::new(),
        }
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, WatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mark_completed(&self, state: &mut WatchState) {
        state.completed = true;
        self.changed.notify_all();
    }

    /// Apply one watch notification.
    pub fn on_event(&self, action: WatchAction, resource: Option<PodSnapshot>) {
        let mut state = self.lock();
        state.pod = resource;
        let phase = state.phase();

        if state.last_reported_phase.as_deref() != Some(phase.as_str()) {
            let app_state = AppState::from_phase(&phase);
            if let Some(sink) = &state.sink {
                sink.set_state(app_state);
            }
            debug!(
                event = "watch.phase_reported",
                domain = "watch",
                app_id = %self.config.app_id,
                phase = %phase,
                state = %app_state
            );
            state.last_reported_phase = Some(phase.clone());
        }

        let details = state
            .pod
            .as_ref()
            .map(format_pod_state)
            .unwrap_or_else(|| PHASE_NOT_OBSERVED.to_string());
        info!(
            event = "watch.state_changed",
            domain = "watch",
            action = ?action,
            phase = %phase,
            "State changed, new state: {}",
            details
        );

        if action.ends_session() || is_terminal_phase(&phase) {
            self.mark_completed(&mut state);
        }
    }

    /// Handle the end of the subscription. A stale resource version is recoverable and only
    /// raises the stale flag; any other end completes the session.
    pub fn on_stream_closed(&self, error: Option<&StreamError>) {
        let mut state = self.lock();
        match error {
            Some(err) if err.is_http_gone() => {
                state.resource_too_old = true;
                debug!(
                    event = "watch.resource_version_gone",
                    domain = "watch",
                    app_id = %self.config.app_id,
                    error = %err,
                    "Got HTTP Gone code, resource version changed in k8s api: {}",
                    err
                );
                self.changed.notify_all();
            }
            _ => {
                debug!(
                    event = "watch.stream_closed",
                    domain = "watch",
                    app_id = %self.config.app_id,
                    error = ?error,
                    "Stopping watching application {} with last-observed phase {}",
                    self.config.app_id,
                    state.phase()
                );
                self.mark_completed(&mut state);
            }
        }
    }

    /// Clear the stale-version flag before resubscribing. Completion is left untouched.
    pub fn reset(&self) {
        self.lock().resource_too_old = false;
    }

    pub fn register_state_sink(&self, sink: Arc<dyn StateSink>) {
        self.lock().sink = Some(sink);
    }

    pub fn clear_state_sink(&self) {
        self.lock().sink = None;
    }

    /// Last observed phase, `"unknown"` before any snapshot.
    pub fn phase(&self) -> String {
        self.lock().phase()
    }

    pub fn app_state(&self) -> AppState {
        AppState::from_phase(&self.phase())
    }

    pub fn is_completed(&self) -> bool {
        self.lock().completed
    }

    pub fn is_resource_too_old(&self) -> bool {
        self.lock().resource_too_old
    }

    pub fn snapshot(&self) -> Option<PodSnapshot> {
        self.lock().pod.clone()
    }

    /// Block until the session stops, or return at once when not configured to wait.
    ///
    /// Returns `true` when the pod completed (or in fire-and-forget mode) and `false` when the
    /// wait ended on a stale resource version; the caller should then `reset` and resubscribe.
    pub fn wait_or_stop(&self, submission_id: &str) -> bool {
        let app_name = &self.config.app_name;
        let app_id = &self.config.app_id;

        if !self.config.wait_for_completion {
            info!(
                event = "watch.deployed",
                domain = "watch",
                app_id = %app_id,
                submission_id = %submission_id,
                "Deployed application {} with application ID {} and submission ID {} into Kubernetes",
                app_name,
                app_id,
                submission_id
            );
            return true;
        }

        info!(
            event = "watch.wait_started",
            domain = "watch",
            app_id = %app_id,
            submission_id = %submission_id,
            "Waiting for application {} with application ID {} and submission ID {} to finish...",
            app_name,
            app_id,
            submission_id
        );

        let interval = self.config.report_interval.max(MIN_WAIT);
        let mut state = self.lock();
        while !state.should_stop() {
            let (guard, _timeout) = self
                .changed
                .wait_timeout(state, interval)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
            let phase = state.phase();
            info!(
                event = "watch.heartbeat",
                domain = "watch",
                app_id = %app_id,
                phase = %phase,
                "Application status for {} (phase: {})",
                app_id,
                phase
            );
        }

        if state.completed {
            match state.pod.as_ref().filter(|p| !p.container_statuses().is_empty()) {
                Some(pod) => info!(
                    event = "watch.container_statuses",
                    domain = "watch",
                    app_id = %app_id,
                    "Container final statuses:\n\n{}",
                    containers_description(pod, 1)
                ),
                None => info!(
                    event = "watch.container_statuses",
                    domain = "watch",
                    app_id = %app_id,
                    "No containers were found in the driver pod."
                ),
            }
            info!(
                event = "watch.finished",
                domain = "watch",
                app_id = %app_id,
                submission_id = %submission_id,
                phase = %state.phase(),
                "Application {} with application ID {} and submission ID {} finished",
                app_name,
                app_id,
                submission_id
            );
        }
        state.completed
    }

    /// Run [`wait_or_stop`](Self::wait_or_stop) on the blocking pool.
    pub async fn wait_or_stop_async(
        self: Arc<Self>,
        submission_id: String,
    ) -> Result<bool, MonitorError> {
        tokio::task::spawn_blocking(move || self.wait_or_stop(&submission_id))
            .await
            .map_err(|e| MonitorError::Join(e.to_string()))
    }
}

impl WatchHandler for ResourceStatusWatcher {
    fn event_received(&self, action: WatchAction, resource: Option<PodSnapshot>) {
        self.on_event(action, resource);
    }

    fn on_close(&self, error: Option<StreamError>) {
        self.on_stream_closed(error.as_ref());
    }
}
