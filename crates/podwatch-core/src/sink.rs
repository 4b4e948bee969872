//! State sinks: where the watcher pushes mapped application states.
//!
//! Implement [`StateSink`] and attach it with
//! [`ResourceStatusWatcher::register_state_sink`](crate::watcher::ResourceStatusWatcher::register_state_sink).
//! The watcher calls the sink while holding its state lock, so a sink must not call back into
//! the watcher.

use std::sync::{Mutex, PoisonError};

use tracing::info;

use crate::state::AppState;

/// Receives application state transitions.
pub trait StateSink: Send + Sync {
    fn set_state(&self, state: AppState);
}

impl<F> StateSink for F
where
    F: Fn(AppState) + Send + Sync,
{
    fn set_state(&self, state: AppState) {
        self(state)
    }
}

/// Sink that only logs each transition.
#[derive(Debug, Clone, Default)]
pub struct LoggingStateSink {
    app_id: String,
}

impl LoggingStateSink {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
        }
    }
}

impl StateSink for LoggingStateSink {
    fn set_state(&self, state: AppState) {
        info!(
            event = "sink.state_reported",
            domain = "sink",
            app_id = %self.app_id,
            state = %state,
            is_final = state.is_final()
        );
    }
}

/// Sink that keeps every reported state in order.
#[derive(Debug, Default)]
pub struct RecordingStateSink {
    states: Mutex<Vec<AppState>>,
}

impl RecordingStateSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn states(&self) -> Vec<AppState> {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<AppState> {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .copied()
    }
}

impl StateSink for RecordingStateSink {
    fn set_state(&self, state: AppState) {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingStateSink::new();
        sink.set_state(AppState::Submitted);
        sink.set_state(AppState::Running);
        assert_eq!(sink.states(), vec![AppState::Submitted, AppState::Running]);
        assert_eq!(sink.last(), Some(AppState::Running));
    }

    #[test]
    fn closures_are_sinks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let sink: Arc<dyn StateSink> = Arc::new(move |_state: AppState| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        sink.set_state(AppState::Failed);
        sink.set_state(AppState::Unknown);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
