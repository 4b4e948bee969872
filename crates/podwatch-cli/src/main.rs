//! Replay a recorded driver pod scenario through the status watcher.
//!
//! ```text
//! podwatch --scenario crates/podwatch-cli/scenarios/stale_then_succeeds.json --report-interval-ms 200
//! ```

mod args;

use std::sync::Arc;

use clap::Parser;
use podwatch_core::observability::init_observability;
use podwatch_core::source::{Scenario, ScriptedEventSource};
use podwatch_core::{
    AppState, LoggingStateSink, RecordingStateSink, ResourceStatusWatcher, StateSink,
    WatcherConfig, monitor_submission,
};
use serde::Serialize;

use crate::args::Args;

/// Printed on stdout once the monitor returns.
#[derive(Debug, Serialize)]
struct Summary {
    app_id: String,
    submission_id: String,
    completed: bool,
    final_phase: String,
    states: Vec<AppState>,
}

/// Fans one report out to the log sink and the recorder.
struct Tee(Vec<Arc<dyn StateSink>>);

impl StateSink for Tee {
    fn set_state(&self, state: AppState) {
        for sink in &self.0 {
            sink.set_state(state);
        }
    }
}

fn run(args: &Args, config: WatcherConfig) -> Result<Summary, Box<dyn std::error::Error>> {
    let scenario = Scenario::from_json_file(&args.scenario)?;
    let submission_id = args.submission_id();

    let source = ScriptedEventSource::new(scenario);
    let watcher = Arc::new(ResourceStatusWatcher::new(config));
    let recorder = Arc::new(RecordingStateSink::new());
    let logger: Arc<dyn StateSink> =
        Arc::new(LoggingStateSink::new(watcher.config().app_id.clone()));
    let recorded: Arc<dyn StateSink> = recorder.clone();
    watcher.register_state_sink(Arc::new(Tee(vec![logger, recorded])));

    let completed = monitor_submission(&source, &watcher, &args.resource, &submission_id)?;
    tracing::debug!(
        event = "cli.monitor_returned",
        domain = "cli",
        completed = completed
    );

    Ok(Summary {
        app_id: watcher.config().app_id.clone(),
        submission_id,
        completed,
        final_phase: watcher.phase(),
        states: recorder.states(),
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    // Loads `./.env` into the environment when no `--env-file` is given, so it also feeds logging.
    let config = args.watcher_config()?;
    init_observability();

    let summary = run(&args, config)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
