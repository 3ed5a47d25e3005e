// ABOUTME: ResourceTracker implementation polling kubectl until ready or failed.
// ABOUTME: Reports each failure once, re-arms the timeout, and tails container logs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::Write;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::client::Kubectl;
use super::error::{KubectlError, KubectlErrorKind};
use super::evaluate::{Failure, PodReport, evaluate, evaluate_pod, parse_log_line, selector};
use crate::multitrack::{
    ResolvedSpec, ResourceStatus, ResourceTracker, TrackFeedback, TrackRequest, TrackSignal,
    TrackerError, TrackerOptions,
};
use crate::types::{ResourceKind, ResourceName};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// What a tracker watches: a workload of some kind, or a single pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Workload(ResourceKind),
    Pod,
}

impl Target {
    pub fn label(&self, name: &ResourceName) -> String {
        match self {
            Target::Workload(kind) => format!("{kind}/{name}"),
            Target::Pod => format!("po/{name}"),
        }
    }

    fn api_resource(&self) -> &'static str {
        match self {
            Target::Workload(kind) => kind.api_resource(),
            Target::Pod => "pod",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Workload(kind) => write!(f, "{kind}"),
            Target::Pod => f.write_str("po"),
        }
    }
}

/// Polls `kubectl get -o json` and evaluates the result.
#[derive(Debug, Clone)]
pub struct KubectlTracker {
    kubectl: Kubectl,
    poll_interval: Duration,
    show_logs: bool,
}

struct Observation {
    status: Option<ResourceStatus>,
    ready: bool,
    failures: Vec<Failure>,
    pods: Vec<PodReport>,
}

impl KubectlTracker {
    pub fn new(kubectl: Kubectl) -> Self {
        Self {
            kubectl,
            poll_interval: DEFAULT_POLL_INTERVAL,
            show_logs: true,
        }
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Print container log lines to stdout while tracking.
    pub fn show_logs(mut self, show: bool) -> Self {
        self.show_logs = show;
        self
    }

    /// Track `target` until feedback says stop, the scope is cancelled or
    /// kubectl fails. Missing objects are waited for.
    pub async fn track_target(
        &self,
        target: Target,
        spec: &ResolvedSpec,
        options: &TrackerOptions,
        feedback: &dyn TrackFeedback,
    ) -> Result<(), TrackerError> {
        let label = target.label(&spec.name);
        let mut failures = FailureWatch::new(spec.failure_threshold);
        let mut logs = LogCursors::new(options.logs_from_time.unwrap_or_else(Utc::now));
        let mut deadline = Instant::now() + options.timeout;

        let mut ticker = time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::debug!(resource = %label, namespace = %spec.namespace, "tracking started");

        loop {
            tokio::select! {
                biased;
                _ = options.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let observed = tokio::select! {
                biased;
                _ = options.cancel.cancelled() => break,
                observed = self.observe(target, spec, options) => observed,
            };

            match observed {
                Ok(observation) => {
                    if let Some(status) = observation.status {
                        feedback.status(status);
                    }
                    if self.show_logs && !spec.display.skip_logs {
                        tokio::select! {
                            biased;
                            _ = options.cancel.cancelled() => break,
                            _ = self.print_logs(&label, spec, &observation.pods, &mut logs) => {}
                        }
                    }

                    if observation.ready && feedback.ready()? == TrackSignal::Stop {
                        return Ok(());
                    }

                    for failure in failures.due(&observation.failures, Instant::now()) {
                        tracing::debug!(resource = %label, "{}", failure.reason);
                        if feedback.failed(&failure.reason)? == TrackSignal::Stop {
                            return Ok(());
                        }
                    }
                }
                Err(err) if err.kind() == KubectlErrorKind::NotFound => {
                    tracing::debug!(resource = %label, "waiting for resource to appear");
                }
                Err(err) => return Err(err.into()),
            }

            if Instant::now() >= deadline {
                let reason = format!(
                    "timed out waiting for {label} after {}s",
                    options.timeout.as_secs()
                );
                if feedback.failed(&reason)? == TrackSignal::Stop {
                    return Ok(());
                }
                deadline = Instant::now() + options.timeout;
            }
        }

        tracing::debug!(resource = %label, "tracking cancelled");
        Ok(())
    }

    async fn observe(
        &self,
        target: Target,
        spec: &ResolvedSpec,
        options: &TrackerOptions,
    ) -> Result<Observation, KubectlError> {
        let object = self
            .kubectl
            .get(&spec.namespace, target.api_resource(), spec.name.as_str())
            .await?;
        let grace = &options.ignore_readiness_probe_fails_by_container;

        let Target::Workload(kind) = target else {
            let report = evaluate_pod(&object, grace, Utc::now());
            return Ok(Observation {
                status: None,
                ready: report.ready,
                failures: report.failures.clone(),
                pods: vec![report],
            });
        };

        let evaluation = evaluate(kind, &object);
        let mut failures: Vec<Failure> = evaluation.failure.into_iter().collect();
        let mut pods = Vec::new();

        if let Some(selector) = selector(&object) {
            let now = Utc::now();
            for pod in self.kubectl.pods(&spec.namespace, &selector).await? {
                let report = evaluate_pod(&pod, grace, now);
                failures.extend(report.failures.iter().cloned());
                pods.push(report);
            }
        }

        Ok(Observation {
            status: Some(evaluation.status),
            ready: evaluation.ready,
            failures,
            pods,
        })
    }

    async fn print_logs(
        &self,
        label: &str,
        spec: &ResolvedSpec,
        pods: &[PodReport],
        cursors: &mut LogCursors,
    ) {
        for pod in pods {
            for container in &pod.containers {
                if !spec.display.shows_container(container) {
                    continue;
                }
                let since = cursors.since(&pod.name, container);
                let text = match self
                    .kubectl
                    .logs(&spec.namespace, &pod.name, container, since)
                    .await
                {
                    Ok(text) => text,
                    Err(err) => {
                        tracing::debug!(pod = %pod.name, container, "no logs yet: {err}");
                        continue;
                    }
                };

                let mut stdout = std::io::stdout().lock();
                for (at, line) in text.lines().filter_map(parse_log_line) {
                    if cursors.advance(&pod.name, container, at)
                        && spec.display.accepts_line(container, line)
                    {
                        let _ = writeln!(stdout, "{label} po/{}/{container} | {line}", pod.name);
                    }
                }
            }
        }
    }
}

#[async_trait]
impl ResourceTracker for KubectlTracker {
    async fn track(
        &self,
        request: &TrackRequest,
        feedback: &dyn TrackFeedback,
    ) -> Result<(), TrackerError> {
        self.track_target(
            Target::Workload(request.kind),
            &request.spec,
            &request.options,
            feedback,
        )
        .await
    }
}

/// Decides when an observed failure is reported: once, after it persisted
/// for the failure threshold.
#[derive(Debug)]
struct FailureWatch {
    threshold: Duration,
    first_seen: HashMap<String, Instant>,
    reported: HashSet<String>,
}

impl FailureWatch {
    fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            first_seen: HashMap::new(),
            reported: HashSet::new(),
        }
    }

    /// Failures to report now. Conditions that cleared start over.
    fn due(&mut self, observed: &[Failure], now: Instant) -> Vec<Failure> {
        let present: HashSet<&str> = observed.iter().map(|f| f.key.as_str()).collect();
        self.first_seen.retain(|key, _| present.contains(key.as_str()));
        self.reported.retain(|key| present.contains(key.as_str()));

        let mut due = Vec::new();
        for failure in observed {
            if self.reported.contains(&failure.key) {
                continue;
            }
            let since = *self.first_seen.entry(failure.key.clone()).or_insert(now);
            if now.duration_since(since) >= self.threshold {
                self.reported.insert(failure.key.clone());
                due.push(failure.clone());
            }
        }
        due
    }
}

/// Per-container position in the log stream.
#[derive(Debug)]
struct LogCursors {
    start: DateTime<Utc>,
    last: HashMap<(String, String), DateTime<Utc>>,
}

impl LogCursors {
    fn new(start: DateTime<Utc>) -> Self {
        Self {
            start,
            last: HashMap::new(),
        }
    }

    fn since(&self, pod: &str, container: &str) -> DateTime<Utc> {
        self.last
            .get(&(pod.to_string(), container.to_string()))
            .copied()
            .unwrap_or(self.start)
    }

    /// Whether a line stamped `at` is new, moving the cursor past it if so.
    fn advance(&mut self, pod: &str, container: &str, at: DateTime<Utc>) -> bool {
        let key = (pod.to_string(), container.to_string());
        let fresh = match self.last.get(&key) {
            Some(last) => at > *last,
            None => at >= self.start,
        };
        if fresh {
            self.last.insert(key, at);
        }
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(key: &str) -> Failure {
        Failure {
            key: key.to_string(),
            reason: format!("{key} happened"),
        }
    }

    #[test]
    fn failures_are_reported_once() {
        let mut watch = FailureWatch::new(Duration::ZERO);
        let now = Instant::now();

        assert_eq!(watch.due(&[failure("a")], now).len(), 1);
        assert!(watch.due(&[failure("a")], now).is_empty());
        assert_eq!(watch.due(&[failure("a"), failure("b")], now).len(), 1);
    }

    #[test]
    fn failures_must_persist_for_the_threshold() {
        let mut watch = FailureWatch::new(Duration::from_secs(30));
        let start = Instant::now();

        assert!(watch.due(&[failure("a")], start).is_empty());
        assert!(
            watch
                .due(&[failure("a")], start + Duration::from_secs(10))
                .is_empty()
        );
        assert_eq!(
            watch
                .due(&[failure("a")], start + Duration::from_secs(30))
                .len(),
            1
        );
    }

    #[test]
    fn cleared_failures_start_over() {
        let mut watch = FailureWatch::new(Duration::from_secs(30));
        let start = Instant::now();

        assert!(watch.due(&[failure("a")], start).is_empty());
        assert!(watch.due(&[], start + Duration::from_secs(20)).is_empty());
        assert!(
            watch
                .due(&[failure("a")], start + Duration::from_secs(40))
                .is_empty()
        );
    }

    #[test]
    fn cleared_then_recurring_failure_is_reported_again() {
        let mut watch = FailureWatch::new(Duration::ZERO);
        let now = Instant::now();

        assert_eq!(watch.due(&[failure("a")], now).len(), 1);
        assert!(watch.due(&[], now).is_empty());
        assert_eq!(watch.due(&[failure("a")], now).len(), 1);
        assert!(watch.reported.len() <= 1);
    }

    #[test]
    fn log_cursor_skips_seen_lines() {
        let start = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut cursors = LogCursors::new(start);
        let before = start - chrono::Duration::seconds(1);
        let after = start + chrono::Duration::seconds(1);

        assert!(!cursors.advance("web-1", "app", before));
        assert!(cursors.advance("web-1", "app", start));
        assert!(cursors.advance("web-1", "app", after));
        assert!(!cursors.advance("web-1", "app", after));
        assert_eq!(cursors.since("web-1", "app"), after);
        assert_eq!(cursors.since("web-1", "sidecar"), start);
    }

    #[test]
    fn target_labels() {
        let name = ResourceName::new("web").unwrap();
        assert_eq!(Target::Workload(ResourceKind::DaemonSet).label(&name), "ds/web");
        assert_eq!(Target::Pod.label(&name), "po/web");
    }
}
