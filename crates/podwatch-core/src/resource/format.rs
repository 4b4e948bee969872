//! Human-readable pod descriptions for the watcher's log lines.

use chrono::{DateTime, SecondsFormat, Utc};

use super::{ContainerStatus, CurrentContainerState, PodSnapshot};

const NOT_AVAILABLE: &str = "N/A";

fn format_time(time: Option<&DateTime<Utc>>) -> String {
    time.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn format_pairs(pairs: &[(&str, String)], indent: usize) -> String {
    let indent_str = "\t".repeat(indent);
    pairs
        .iter()
        .map(|(key, value)| {
            let value = if value.is_empty() { NOT_AVAILABLE } else { value };
            format!("\n{indent_str}{key}: {value}")
        })
        .collect()
}

fn opt(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

fn container_state_pairs(status: &ContainerStatus) -> Vec<(&'static str, String)> {
    match status.state.current() {
        Some(CurrentContainerState::Running(running)) => vec![
            ("container state", "running".to_string()),
            ("container started at", format_time(running.started_at.as_ref())),
        ],
        Some(CurrentContainerState::Terminated(terminated)) => vec![
            ("container state", "terminated".to_string()),
            ("container started at", format_time(terminated.started_at.as_ref())),
            ("container finished at", format_time(terminated.finished_at.as_ref())),
            ("exit code", terminated.exit_code.to_string()),
            ("termination reason", opt(terminated.reason.as_deref())),
        ],
        Some(CurrentContainerState::Waiting(waiting)) => vec![
            ("container state", "waiting".to_string()),
            ("pending reason", opt(waiting.reason.as_deref())),
        ],
        None => vec![("container state", NOT_AVAILABLE.to_string())],
    }
}

/// Describe every container of the pod, one bundle per container, separated by a blank line.
pub fn containers_description(pod: &PodSnapshot, indent: usize) -> String {
    pod.container_statuses()
        .iter()
        .map(|status| {
            let mut pairs = vec![
                ("container name", status.name.clone()),
                ("container image", opt(status.image.as_deref())),
            ];
            pairs.extend(container_state_pairs(status));
            format_pairs(&pairs, indent)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Multi-line description of the pod: identity, scheduling, phase and container states.
pub fn format_pod_state(pod: &PodSnapshot) -> String {
    let labels = pod
        .metadata
        .labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ");
    let volumes = pod
        .spec
        .volumes
        .iter()
        .map(|v| v.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let start_time = pod.status.as_ref().and_then(|s| s.start_time.as_ref());
    let details = [
        ("pod name", opt(pod.metadata.name.as_deref())),
        ("namespace", opt(pod.metadata.namespace.as_deref())),
        ("labels", labels),
        ("pod uid", opt(pod.metadata.uid.as_deref())),
        ("creation time", format_time(pod.metadata.creation_timestamp.as_ref())),
        ("service account name", opt(pod.spec.service_account_name.as_deref())),
        ("volumes", volumes),
        ("node name", opt(pod.spec.node_name.as_deref())),
        ("start time", format_time(start_time)),
        ("phase", opt(pod.phase())),
        ("container status", containers_description(pod, 2)),
    ];
    format_pairs(&details, 1)
}
