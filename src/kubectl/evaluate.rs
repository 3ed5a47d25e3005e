// ABOUTME: Readiness and failure evaluation of kubectl JSON objects.
// ABOUTME: Pure functions of the fetched object, so they are tested on fixtures.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use crate::multitrack::{CanaryStatus, JobStatus, ReplicaStatus, ResourceStatus};
use crate::types::ResourceKind;

/// Container waiting reasons that never resolve by themselves.
pub const FAILURE_REASONS: [&str; 7] = [
    "ErrImagePull",
    "ImagePullBackOff",
    "ErrImageNeverPull",
    "InvalidImageName",
    "CrashLoopBackOff",
    "CreateContainerConfigError",
    "CreateContainerError",
];

/// Kubernetes defaults for readiness probe timing.
const PROBE_DEFAULT_PERIOD_SECS: u64 = 10;
const PROBE_DEFAULT_FAILURE_THRESHOLD: u64 = 3;

/// A failure condition observed on an object.
///
/// `key` identifies the condition so it is reported once; `reason` is the
/// message handed to the failure callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub key: String,
    pub reason: String,
}

/// Outcome of evaluating a workload object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub status: ResourceStatus,
    pub ready: bool,
    pub failure: Option<Failure>,
}

/// Evaluate a workload object of `kind` as returned by `kubectl get -o json`.
pub fn evaluate(kind: ResourceKind, object: &Value) -> Evaluation {
    match kind {
        ResourceKind::Deployment => evaluate_deployment(object),
        ResourceKind::StatefulSet => evaluate_statefulset(object),
        ResourceKind::DaemonSet => evaluate_daemonset(object),
        ResourceKind::Job => evaluate_job(object),
        ResourceKind::Canary => evaluate_canary(object),
    }
}

fn evaluate_deployment(object: &Value) -> Evaluation {
    let desired = count_or(object, "/spec/replicas", 1);
    let total = count(object, "/status/replicas");
    let mut status = ReplicaStatus {
        desired,
        updated: count(object, "/status/updatedReplicas"),
        ready: count(object, "/status/readyReplicas"),
        available: count(object, "/status/availableReplicas"),
        ..Default::default()
    };

    let observed = generation_observed(object);
    if !observed {
        status.waiting_for.push("new generation to be observed".to_string());
    }
    push_missing(&mut status.waiting_for, "up-to-date", status.updated, desired);
    push_missing(&mut status.waiting_for, "available", status.available, desired);
    if total > status.updated {
        status.waiting_for.push(format!(
            "{} old replicas to terminate",
            total - status.updated
        ));
    }
    status.is_ready = status.waiting_for.is_empty();

    let failure = condition(object, "Progressing")
        .filter(|c| str_at(c, "/reason") == Some("ProgressDeadlineExceeded"))
        .map(|c| Failure {
            key: "ProgressDeadlineExceeded".to_string(),
            reason: format!(
                "progress deadline exceeded: {}",
                str_at(c, "/message").unwrap_or("rollout stalled")
            ),
        });

    Evaluation {
        ready: status.is_ready,
        status: ResourceStatus::Deployment(status),
        failure,
    }
}

fn evaluate_statefulset(object: &Value) -> Evaluation {
    let desired = count_or(object, "/spec/replicas", 1);
    let ready = count(object, "/status/readyReplicas");
    let mut status = ReplicaStatus {
        desired,
        updated: count(object, "/status/updatedReplicas"),
        ready,
        available: count_or(object, "/status/availableReplicas", ready),
        ..Default::default()
    };

    let revision_current = match (
        str_at(object, "/status/currentRevision"),
        str_at(object, "/status/updateRevision"),
    ) {
        (Some(current), Some(update)) => current == update,
        _ => status.updated == desired,
    };

    if !generation_observed(object) {
        status.waiting_for.push("new generation to be observed".to_string());
    }
    push_missing(&mut status.waiting_for, "ready", status.ready, desired);
    if !revision_current {
        push_missing(&mut status.waiting_for, "up-to-date", status.updated, desired);
    }
    status.is_ready = status.waiting_for.is_empty();

    Evaluation {
        ready: status.is_ready,
        status: ResourceStatus::StatefulSet(status),
        failure: None,
    }
}

fn evaluate_daemonset(object: &Value) -> Evaluation {
    let desired = count(object, "/status/desiredNumberScheduled");
    let mut status = ReplicaStatus {
        desired,
        updated: count(object, "/status/updatedNumberScheduled"),
        ready: count(object, "/status/numberReady"),
        available: count(object, "/status/numberAvailable"),
        ..Default::default()
    };

    if !generation_observed(object) {
        status.waiting_for.push("new generation to be observed".to_string());
    }
    push_missing(&mut status.waiting_for, "up-to-date", status.updated, desired);
    push_missing(&mut status.waiting_for, "available", status.available, desired);
    status.is_ready = status.waiting_for.is_empty();

    Evaluation {
        ready: status.is_ready,
        status: ResourceStatus::DaemonSet(status),
        failure: None,
    }
}

fn evaluate_job(object: &Value) -> Evaluation {
    let complete = condition_true(object, "Complete");
    let status = JobStatus {
        active: count(object, "/status/active"),
        succeeded: count(object, "/status/succeeded"),
        failed: count(object, "/status/failed"),
        is_complete: complete,
    };

    let failure = condition(object, "Failed")
        .filter(|c| str_at(c, "/status") == Some("True"))
        .map(|c| {
            let reason = str_at(c, "/reason").unwrap_or("Failed");
            Failure {
                key: reason.to_string(),
                reason: match str_at(c, "/message") {
                    Some(message) => format!("{reason}: {message}"),
                    None => reason.to_string(),
                },
            }
        });

    Evaluation {
        status: ResourceStatus::Job(status),
        ready: complete,
        failure,
    }
}

fn evaluate_canary(object: &Value) -> Evaluation {
    let phase = str_at(object, "/status/phase").unwrap_or("Initializing");
    let status = CanaryStatus {
        phase: phase.to_string(),
        canary_weight: count(object, "/status/canaryWeight"),
        failed_checks: count(object, "/status/failedChecks"),
    };

    let failure = (phase == "Failed").then(|| {
        let detail = condition(object, "Promoted")
            .and_then(|c| str_at(c, "/message"))
            .unwrap_or("canary analysis failed");
        Failure {
            key: "Failed".to_string(),
            reason: detail.to_string(),
        }
    });

    Evaluation {
        ready: phase == "Succeeded",
        status: ResourceStatus::Canary(status),
        failure,
    }
}

/// Label selector of a workload as a `kubectl -l` argument.
///
/// Only `matchLabels` is used; canaries have no selector of their own.
pub fn selector(object: &Value) -> Option<String> {
    let labels = object.pointer("/spec/selector/matchLabels")?.as_object()?;
    if labels.is_empty() {
        return None;
    }
    let mut pairs: Vec<String> = labels
        .iter()
        .filter_map(|(k, v)| v.as_str().map(|v| format!("{k}={v}")))
        .collect();
    pairs.sort();
    Some(pairs.join(","))
}

/// Observed state of one pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodReport {
    pub name: String,
    pub phase: String,
    pub ready: bool,
    /// Containers, init containers first.
    pub containers: Vec<String>,
    pub failures: Vec<Failure>,
}

/// Evaluate a pod object.
///
/// A running container that is not ready counts as a failing readiness probe
/// once it has been running longer than its grace: the per-container entry of
/// `readiness_grace` if present, else what its probe settings allow.
pub fn evaluate_pod(
    pod: &Value,
    readiness_grace: &HashMap<String, Duration>,
    now: DateTime<Utc>,
) -> PodReport {
    let name = str_at(pod, "/metadata/name").unwrap_or_default().to_string();
    let phase = str_at(pod, "/status/phase").unwrap_or("Pending").to_string();
    let ready = phase == "Succeeded" || (phase == "Running" && condition_true(pod, "Ready"));

    let mut containers = Vec::new();
    let mut failures = Vec::new();

    for list in ["/status/initContainerStatuses", "/status/containerStatuses"] {
        for container in array(pod, list) {
            let Some(container_name) = str_at(container, "/name") else {
                continue;
            };
            containers.push(container_name.to_string());

            let waiting = str_at(container, "/state/waiting/reason")
                .filter(|reason| FAILURE_REASONS.contains(reason));
            if let Some(reason) = waiting {
                let mut text = format!("pod/{name} container {container_name}: {reason}");
                if let Some(message) = str_at(container, "/state/waiting/message") {
                    text.push_str(": ");
                    text.push_str(message);
                }
                failures.push(Failure {
                    key: format!("{name}/{container_name}/{reason}"),
                    reason: text,
                });
            }

            if readiness_probe_failing(pod, container, readiness_grace, now) {
                failures.push(Failure {
                    key: format!("{name}/{container_name}/readiness"),
                    reason: format!(
                        "pod/{name} container {container_name}: readiness probe is failing"
                    ),
                });
            }
        }
    }

    if phase == "Failed" {
        let reason = str_at(pod, "/status/reason").unwrap_or("Failed");
        let text = match str_at(pod, "/status/message") {
            Some(message) => format!("pod/{name} failed: {reason}: {message}"),
            None => format!("pod/{name} failed: {reason}"),
        };
        failures.push(Failure {
            key: format!("{name}/phase/Failed"),
            reason: text,
        });
    }

    PodReport {
        name,
        phase,
        ready,
        containers,
        failures,
    }
}

fn readiness_probe_failing(
    pod: &Value,
    container: &Value,
    readiness_grace: &HashMap<String, Duration>,
    now: DateTime<Utc>,
) -> bool {
    if container.get("ready").and_then(Value::as_bool) != Some(false) {
        return false;
    }
    let Some(started) = str_at(container, "/state/running/startedAt")
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
    else {
        return false;
    };
    let Some(name) = str_at(container, "/name") else {
        return false;
    };

    let grace = match readiness_grace.get(name) {
        Some(grace) => *grace,
        None => match probe_grace(pod, name) {
            Some(grace) => grace,
            None => return false,
        },
    };

    (now - started)
        .to_std()
        .map(|running| running > grace)
        .unwrap_or(false)
}

/// How long a container's readiness probe may fail right after start.
fn probe_grace(pod: &Value, container: &str) -> Option<Duration> {
    let spec = array(pod, "/spec/containers")
        .iter()
        .find(|c| str_at(c, "/name") == Some(container))?;
    let probe = spec.get("readinessProbe")?;

    let initial = u64_at(probe, "/initialDelaySeconds").unwrap_or(0);
    let period = u64_at(probe, "/periodSeconds").unwrap_or(PROBE_DEFAULT_PERIOD_SECS);
    let threshold =
        u64_at(probe, "/failureThreshold").unwrap_or(PROBE_DEFAULT_FAILURE_THRESHOLD);
    Some(Duration::from_secs(initial + period * threshold))
}

/// Split a `kubectl logs --timestamps` line into timestamp and text.
pub fn parse_log_line(line: &str) -> Option<(DateTime<Utc>, &str)> {
    let (stamp, text) = line.split_once(' ').unwrap_or((line, ""));
    let at = DateTime::parse_from_rfc3339(stamp).ok()?.with_timezone(&Utc);
    Some((at, text))
}

fn generation_observed(object: &Value) -> bool {
    let generation = object.pointer("/metadata/generation").and_then(Value::as_i64);
    let observed = object
        .pointer("/status/observedGeneration")
        .and_then(Value::as_i64);
    match (generation, observed) {
        (Some(generation), Some(observed)) => observed >= generation,
        (None, _) => true,
        (Some(_), None) => false,
    }
}

fn push_missing(waiting_for: &mut Vec<String>, what: &str, have: u32, want: u32) {
    if have < want {
        waiting_for.push(format!("{} {what} replicas", want - have));
    }
}

fn condition<'a>(object: &'a Value, kind: &str) -> Option<&'a Value> {
    array(object, "/status/conditions")
        .iter()
        .find(|c| str_at(c, "/type") == Some(kind))
}

fn condition_true(object: &Value, kind: &str) -> bool {
    condition(object, kind).is_some_and(|c| str_at(c, "/status") == Some("True"))
}

fn array<'a>(object: &'a Value, pointer: &str) -> &'a [Value] {
    object
        .pointer(pointer)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn str_at<'a>(object: &'a Value, pointer: &str) -> Option<&'a str> {
    object.pointer(pointer).and_then(Value::as_str)
}

fn u64_at(object: &Value, pointer: &str) -> Option<u64> {
    object.pointer(pointer).and_then(Value::as_u64)
}

fn count_or(object: &Value, pointer: &str, default: u32) -> u32 {
    u64_at(object, pointer)
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
        .unwrap_or(default)
}

fn count(object: &Value, pointer: &str) -> u32 {
    count_or(object, pointer, 0)
}
