// ABOUTME: Tracking specifications and their default normalization.
// ABOUTME: A TrackSpec becomes an immutable ResolvedSpec before any task starts.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::types::{Namespace, ResourceKind, ResourceName};

/// Whether a resource's own readiness is required to end the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrackTerminationMode {
    /// The run keeps going until this resource is ready (or failed).
    #[default]
    WaitUntilResourceReady,
    /// The resource is tracked in the background and may be cancelled once
    /// every other in-flight resource is non-blocking too.
    NonBlocking,
}

/// How observed failures of a resource affect the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailMode {
    /// Count failures and never fail the run.
    IgnoreAndContinueDeployProcess,
    /// Count failures against the allowed budget, abort the run when exceeded.
    #[default]
    FailWholeDeployProcessImmediately,
    /// Defer counting until no other resource is still plainly active.
    HopeUntilEndOfDeployProcess,
}

/// Log and message display options handed through to trackers.
#[derive(Debug, Clone, Default)]
pub struct DisplayOptions {
    pub log_regex: Option<Regex>,
    pub log_regex_by_container: HashMap<String, Regex>,
    pub skip_logs: bool,
    pub skip_logs_for_containers: Vec<String>,
    pub show_logs_only_for_containers: Vec<String>,
    pub show_service_messages: bool,
}

impl DisplayOptions {
    /// Whether logs of `container` should be shown at all.
    pub fn shows_container(&self, container: &str) -> bool {
        if self.skip_logs {
            return false;
        }
        if self.skip_logs_for_containers.iter().any(|c| c == container) {
            return false;
        }
        self.show_logs_only_for_containers.is_empty()
            || self
                .show_logs_only_for_containers
                .iter()
                .any(|c| c == container)
    }

    /// Whether a single log line of `container` passes the configured filters.
    ///
    /// A per-container regex takes precedence over the global one.
    pub fn accepts_line(&self, container: &str, line: &str) -> bool {
        if !self.shows_container(container) {
            return false;
        }
        match self
            .log_regex_by_container
            .get(container)
            .or(self.log_regex.as_ref())
        {
            Some(re) => re.is_match(line),
            None => true,
        }
    }
}

/// Caller-supplied tracking specification for one resource.
///
/// Unset policy fields are filled in by [`TrackSpec::resolve`].
#[derive(Debug, Clone)]
pub struct TrackSpec {
    pub name: ResourceName,
    pub namespace: Namespace,
    pub termination_mode: Option<TrackTerminationMode>,
    pub fail_mode: Option<FailMode>,
    pub allow_failures_count: Option<u32>,
    pub failure_threshold: Option<Duration>,
    pub ignore_readiness_probe_fails_by_container: HashMap<String, Duration>,
    pub display: DisplayOptions,
}

impl TrackSpec {
    /// Create a spec for `name` in the default namespace with every policy unset.
    pub fn new(name: ResourceName) -> Self {
        Self {
            name,
            namespace: Namespace::default(),
            termination_mode: None,
            fail_mode: None,
            allow_failures_count: None,
            failure_threshold: None,
            ignore_readiness_probe_fails_by_container: HashMap::new(),
            display: DisplayOptions::default(),
        }
    }

    pub fn namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn termination_mode(mut self, mode: TrackTerminationMode) -> Self {
        self.termination_mode = Some(mode);
        self
    }

    pub fn fail_mode(mut self, mode: FailMode) -> Self {
        self.fail_mode = Some(mode);
        self
    }

    pub fn allow_failures_count(mut self, count: u32) -> Self {
        self.allow_failures_count = Some(count);
        self
    }

    pub fn failure_threshold(mut self, threshold: Duration) -> Self {
        self.failure_threshold = Some(threshold);
        self
    }

    /// Apply defaults for a resource of `kind`.
    ///
    /// Canaries tolerate zero failures whatever the caller asked for.
    pub fn resolve(self, kind: ResourceKind) -> ResolvedSpec {
        let allow_failures_count = match kind {
            ResourceKind::Canary => 0,
            _ => self.allow_failures_count.unwrap_or(DEFAULT_ALLOW_FAILURES_COUNT),
        };

        ResolvedSpec {
            name: self.name,
            namespace: self.namespace,
            termination_mode: self.termination_mode.unwrap_or_default(),
            fail_mode: self.fail_mode.unwrap_or_default(),
            allow_failures_count,
            failure_threshold: self.failure_threshold.unwrap_or(Duration::ZERO),
            ignore_readiness_probe_fails_by_container: self
                .ignore_readiness_probe_fails_by_container,
            display: self.display,
        }
    }
}

pub const DEFAULT_ALLOW_FAILURES_COUNT: u32 = 1;

/// A normalized, immutable tracking specification.
#[derive(Debug, Clone)]
pub struct ResolvedSpec {
    pub name: ResourceName,
    pub namespace: Namespace,
    pub termination_mode: TrackTerminationMode,
    pub fail_mode: FailMode,
    pub allow_failures_count: u32,
    pub failure_threshold: Duration,
    pub ignore_readiness_probe_fails_by_container: HashMap<String, Duration>,
    pub display: DisplayOptions,
}

/// Specs grouped by workload kind.
#[derive(Debug, Clone, Default)]
pub struct MultitrackSpecs {
    pub deployments: Vec<TrackSpec>,
    pub statefulsets: Vec<TrackSpec>,
    pub daemonsets: Vec<TrackSpec>,
    pub jobs: Vec<TrackSpec>,
    pub canaries: Vec<TrackSpec>,
}

impl MultitrackSpecs {
    pub fn len(&self) -> usize {
        self.deployments.len()
            + self.statefulsets.len()
            + self.daemonsets.len()
            + self.jobs.len()
            + self.canaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Specs of one kind.
    pub fn of_kind_mut(&mut self, kind: ResourceKind) -> &mut Vec<TrackSpec> {
        match kind {
            ResourceKind::Deployment => &mut self.deployments,
            ResourceKind::StatefulSet => &mut self.statefulsets,
            ResourceKind::DaemonSet => &mut self.daemonsets,
            ResourceKind::Job => &mut self.jobs,
            ResourceKind::Canary => &mut self.canaries,
        }
    }

    /// Apply defaults to every spec, keeping kind grouping and input order.
    pub fn normalize(self) -> Vec<(ResourceKind, ResolvedSpec)> {
        let groups = [
            (ResourceKind::Deployment, self.deployments),
            (ResourceKind::StatefulSet, self.statefulsets),
            (ResourceKind::DaemonSet, self.daemonsets),
            (ResourceKind::Job, self.jobs),
            (ResourceKind::Canary, self.canaries),
        ];

        groups
            .into_iter()
            .flat_map(|(kind, specs)| specs.into_iter().map(move |s| (kind, s.resolve(kind))))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str) -> TrackSpec {
        TrackSpec::new(ResourceName::new(name).unwrap())
    }

    #[test]
    fn unset_fields_get_defaults() {
        let resolved = spec("web").resolve(ResourceKind::Deployment);
        assert_eq!(
            resolved.termination_mode,
            TrackTerminationMode::WaitUntilResourceReady
        );
        assert_eq!(resolved.fail_mode, FailMode::FailWholeDeployProcessImmediately);
        assert_eq!(resolved.allow_failures_count, 1);
        assert_eq!(resolved.failure_threshold, Duration::ZERO);
        assert_eq!(resolved.namespace.as_str(), "default");
    }

    #[test]
    fn explicit_fields_are_kept() {
        let resolved = spec("web")
            .termination_mode(TrackTerminationMode::NonBlocking)
            .fail_mode(FailMode::HopeUntilEndOfDeployProcess)
            .allow_failures_count(4)
            .failure_threshold(Duration::from_secs(30))
            .resolve(ResourceKind::StatefulSet);

        assert_eq!(resolved.termination_mode, TrackTerminationMode::NonBlocking);
        assert_eq!(resolved.fail_mode, FailMode::HopeUntilEndOfDeployProcess);
        assert_eq!(resolved.allow_failures_count, 4);
        assert_eq!(resolved.failure_threshold, Duration::from_secs(30));
    }

    #[test]
    fn canaries_tolerate_no_failures() {
        let resolved = spec("rollout")
            .allow_failures_count(5)
            .resolve(ResourceKind::Canary);
        assert_eq!(resolved.allow_failures_count, 0);

        let resolved = spec("rollout").resolve(ResourceKind::Canary);
        assert_eq!(resolved.allow_failures_count, 0);
    }

    #[test]
    fn normalize_keeps_kind_grouping() {
        let specs = MultitrackSpecs {
            jobs: vec![spec("migrate")],
            deployments: vec![spec("web"), spec("api")],
            canaries: vec![spec("front")],
            ..Default::default()
        };
        assert_eq!(specs.len(), 4);

        let resolved = specs.normalize();
        let names: Vec<_> = resolved
            .iter()
            .map(|(kind, s)| format!("{}/{}", kind, s.name))
            .collect();
        assert_eq!(
            names,
            vec!["deploy/web", "deploy/api", "job/migrate", "canary/front"]
        );
    }

    #[test]
    fn empty_specs_are_empty() {
        assert!(MultitrackSpecs::default().is_empty());
    }

    #[test]
    fn display_options_filter_containers() {
        let display = DisplayOptions {
            skip_logs_for_containers: vec!["istio-proxy".to_string()],
            ..Default::default()
        };
        assert!(display.shows_container("app"));
        assert!(!display.shows_container("istio-proxy"));

        let only = DisplayOptions {
            show_logs_only_for_containers: vec!["app".to_string()],
            ..Default::default()
        };
        assert!(only.shows_container("app"));
        assert!(!only.shows_container("sidecar"));

        let skip_all = DisplayOptions {
            skip_logs: true,
            ..Default::default()
        };
        assert!(!skip_all.shows_container("app"));
    }

    #[test]
    fn container_regex_overrides_global_regex() {
        let mut display = DisplayOptions {
            log_regex: Some(Regex::new("ERROR").unwrap()),
            ..Default::default()
        };
        display
            .log_regex_by_container
            .insert("worker".to_string(), Regex::new("panic").unwrap());

        assert!(display.accepts_line("app", "ERROR boom"));
        assert!(!display.accepts_line("app", "INFO ok"));
        assert!(display.accepts_line("worker", "thread panicked: panic"));
        assert!(!display.accepts_line("worker", "ERROR boom"));
    }
}
