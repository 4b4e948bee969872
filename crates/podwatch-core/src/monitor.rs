//! Submission monitor: subscribes a watcher to an event source and resubscribes whenever the
//! watch ends on a stale resource version, until the pod completes.

use std::sync::Arc;

use tracing::info;

use crate::error::MonitorError;
use crate::source::{EventSource, WatchAction, WatchHandler};
use crate::watcher::ResourceStatusWatcher;

/// Watch `resource_name` until `wait_or_stop` reports completion.
///
/// Each round resets the stale flag, seeds the watcher with the pod as the source currently sees
/// it (transitions may have been missed while the cursor was stale), opens a subscription, then
/// waits. `max_resubscribes` from the watcher config bounds the number of stale rounds.
pub fn monitor_submission(
    source: &dyn EventSource,
    watcher: &Arc<ResourceStatusWatcher>,
    resource_name: &str,
    submission_id: &str,
) -> Result<bool, MonitorError> {
    let max_resubscribes = watcher.config().max_resubscribes;
    let mut resubscribes: u32 = 0;
    loop {
        watcher.reset();
        // Seed before subscribing: every watched event is then newer than the seed.
        let current = source.get(resource_name)?;
        watcher.on_event(WatchAction::Modified, current);
        let handler: Arc<dyn WatchHandler> = watcher.clone();
        let subscription = source.watch(resource_name, handler)?;

        let done = watcher.wait_or_stop(submission_id);
        subscription.close();
        if done {
            return Ok(true);
        }

        resubscribes += 1;
        if max_resubscribes.is_some_and(|max| resubscribes > max) {
            return Err(MonitorError::ResubscribeLimit(resubscribes - 1));
        }
        info!(
            event = "monitor.resubscribing",
            domain = "monitor",
            app_id = %watcher.config().app_id,
            submission_id = %submission_id,
            resource = %resource_name,
            attempt = resubscribes,
            phase = %watcher.phase()
        );
    }
}

/// Async entrypoint: runs [`monitor_submission`] on the blocking pool.
pub async fn monitor_submission_async(
    source: Arc<dyn EventSource>,
    watcher: Arc<ResourceStatusWatcher>,
    resource_name: String,
    submission_id: String,
) -> Result<bool, MonitorError> {
    tokio::task::spawn_blocking(move || {
        monitor_submission(source.as_ref(), &watcher, &resource_name, &submission_id)
    })
    .await
    .map_err(|e| MonitorError::Join(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WatcherConfig;
    use crate::error::SourceError;
    use crate::resource::PodSnapshot;
    use crate::sink::RecordingStateSink;
    use crate::source::{Scenario, ScriptStep, ScriptedEventSource, StreamError};
    use crate::state::AppState;
    use std::time::Duration;

    fn config() -> WatcherConfig {
        WatcherConfig::new("etl", "app-7").with_report_interval(Duration::from_millis(20))
    }

    fn pod(phase: &str) -> Option<PodSnapshot> {
        Some(PodSnapshot::with_phase("driver", phase))
    }

    fn gone() -> ScriptStep {
        ScriptStep::close(Some(StreamError::from_status(Some(410), "too old resource version")))
    }

    #[test]
    fn resubscribes_after_stale_version_and_completes() {
        let source = ScriptedEventSource::new(Scenario {
            initial: pod("Pending"),
            sessions: vec![
                vec![
                    ScriptStep::event(WatchAction::Modified, pod("Running")).after(20),
                    gone().after(20),
                ],
                vec![ScriptStep::event(WatchAction::Modified, pod("Succeeded")).after(20)],
            ],
        });
        let watcher = Arc::new(ResourceStatusWatcher::new(config()));
        let sink = Arc::new(RecordingStateSink::new());
        watcher.register_state_sink(sink.clone());

        let done = monitor_submission(&source, &watcher, "driver", "jobs:driver").unwrap();
        assert!(done);
        assert_eq!(source.remaining_sessions(), 0);
        // The second round is seeded with `Running` again, which is debounced.
        assert_eq!(
            sink.states(),
            vec![AppState::Submitted, AppState::Running, AppState::Finished]
        );
    }

    #[test]
    fn seed_never_overtakes_a_watched_event() {
        for round in 0..500 {
            let source = ScriptedEventSource::new(Scenario {
                initial: pod("Pending"),
                sessions: vec![vec![ScriptStep::event(WatchAction::Modified, pod("Succeeded"))]],
            });
            let watcher = Arc::new(ResourceStatusWatcher::new(config()));
            let sink = Arc::new(RecordingStateSink::new());
            watcher.register_state_sink(sink.clone());

            assert!(monitor_submission(&source, &watcher, "driver", "jobs:driver").unwrap());
            assert_eq!(
                sink.states(),
                vec![AppState::Submitted, AppState::Finished],
                "round {round}"
            );
            assert_eq!(watcher.phase(), "Succeeded", "round {round}");
        }
    }

    #[test]
    fn failed_get_does_not_subscribe() {
        struct Unreachable;

        impl EventSource for Unreachable {
            fn get(&self, name: &str) -> Result<Option<PodSnapshot>, SourceError> {
                Err(SourceError::Get {
                    resource: name.to_string(),
                    message: "connection refused".into(),
                })
            }

            fn watch(
                &self,
                _name: &str,
                _handler: Arc<dyn WatchHandler>,
            ) -> Result<Box<dyn crate::source::Subscription>, SourceError> {
                panic!("watch must not be opened when the seed read fails");
            }
        }

        let watcher = Arc::new(ResourceStatusWatcher::new(config()));
        let err = monitor_submission(&Unreachable, &watcher, "driver", "jobs:driver").unwrap_err();
        assert!(matches!(err, MonitorError::Source(SourceError::Get { .. })));
    }

    #[test]
    fn gives_up_after_resubscribe_limit() {
        let source = ScriptedEventSource::new(Scenario {
            initial: pod("Running"),
            sessions: vec![vec![gone().after(10)], vec![gone().after(10)], vec![gone().after(10)]],
        });
        let watcher = Arc::new(ResourceStatusWatcher::new(
            config().with_max_resubscribes(Some(1)),
        ));
        let err = monitor_submission(&source, &watcher, "driver", "jobs:driver").unwrap_err();
        assert!(matches!(err, MonitorError::ResubscribeLimit(1)));
        assert_eq!(source.remaining_sessions(), 1);
    }

    #[test]
    fn exhausted_source_is_an_error() {
        let source = ScriptedEventSource::new(Scenario {
            initial: pod("Running"),
            sessions: vec![vec![gone()]],
        });
        let watcher = Arc::new(ResourceStatusWatcher::new(config()));
        let err = monitor_submission(&source, &watcher, "driver", "jobs:driver").unwrap_err();
        assert!(matches!(err, MonitorError::Source(_)));
    }

    #[test]
    fn terminal_initial_state_completes_without_events() {
        let source = ScriptedEventSource::new(Scenario {
            initial: pod("Failed"),
            sessions: vec![vec![]],
        });
        let watcher = Arc::new(ResourceStatusWatcher::new(config()));
        assert!(monitor_submission(&source, &watcher, "driver", "jobs:driver").unwrap());
        assert_eq!(watcher.app_state(), AppState::Failed);
    }

    #[test]
    fn non_blocking_mode_returns_after_one_round() {
        let source = ScriptedEventSource::new(Scenario {
            initial: pod("Pending"),
            sessions: vec![vec![ScriptStep::event(WatchAction::Modified, pod("Running")).after(500)]],
        });
        let watcher = Arc::new(ResourceStatusWatcher::new(
            config().with_wait_for_completion(false),
        ));
        assert!(monitor_submission(&source, &watcher, "driver", "jobs:driver").unwrap());
        assert!(!watcher.is_completed());
    }

    #[tokio::test]
    async fn async_monitor_completes() {
        let source: Arc<dyn EventSource> = Arc::new(ScriptedEventSource::new(Scenario {
            initial: pod("Pending"),
            sessions: vec![vec![
                ScriptStep::event(WatchAction::Modified, pod("Running")).after(10),
                ScriptStep::event(WatchAction::Deleted, pod("Running")).after(10),
            ]],
        }));
        let watcher = Arc::new(ResourceStatusWatcher::new(config()));
        let done = monitor_submission_async(source, watcher.clone(), "driver".into(), "jobs:driver".into())
            .await
            .unwrap();
        assert!(done);
        assert!(watcher.is_completed());
    }
}
