// ABOUTME: Manifest types and parsing for rolltrack.yml.
// ABOUTME: Handles YAML parsing, discovery and conversion into multitrack specs.

mod deserialize;
mod entry;
mod init;

pub use entry::ResourceEntry;
pub use init::init_manifest;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::multitrack::{DEFAULT_TIMEOUT, MultitrackOptions, MultitrackSpecs};
use crate::types::{Namespace, ResourceKind};
use deserialize::deserialize_namespace_option;

pub const CONFIG_FILENAME: &str = "rolltrack.yml";
pub const CONFIG_FILENAME_ALT: &str = "rolltrack.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".rolltrack/config.yml";

/// A set of resources to track together.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Namespace for entries that do not name one.
    #[serde(default, deserialize_with = "deserialize_namespace_option")]
    pub namespace: Option<Namespace>,

    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// `0s` disables periodic status output.
    #[serde(default, with = "humantime_serde")]
    pub status_progress_period: Option<Duration>,

    #[serde(default)]
    pub logs_since: Option<DateTime<Utc>>,

    #[serde(default)]
    pub deployments: Vec<ResourceEntry>,

    #[serde(default)]
    pub statefulsets: Vec<ResourceEntry>,

    #[serde(default)]
    pub daemonsets: Vec<ResourceEntry>,

    #[serde(default)]
    pub jobs: Vec<ResourceEntry>,

    #[serde(default)]
    pub canaries: Vec<ResourceEntry>,
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

impl Manifest {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading manifest");
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Number of resources in the manifest.
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

    /// Tracking specs for every entry.
    ///
    /// An entry's own namespace wins over the manifest's, which wins over
    /// `fallback`.
    pub fn specs(&self, fallback: &Namespace) -> MultitrackSpecs {
        let namespace = self.namespace.as_ref().unwrap_or(fallback);
        let mut specs = MultitrackSpecs::default();

        for kind in ResourceKind::ALL {
            let entries = match kind {
                ResourceKind::Deployment => &self.deployments,
                ResourceKind::StatefulSet => &self.statefulsets,
                ResourceKind::DaemonSet => &self.daemonsets,
                ResourceKind::Job => &self.jobs,
                ResourceKind::Canary => &self.canaries,
            };
            specs.of_kind_mut(kind).extend(
                entries
                    .iter()
                    .cloned()
                    .map(|entry| entry.into_track_spec(namespace)),
            );
        }

        specs
    }

    /// Run options under the process-wide cancellation scope `parent`.
    pub fn options(&self, parent: CancellationToken) -> MultitrackOptions {
        MultitrackOptions {
            parent,
            timeout: self.timeout,
            status_progress_period: self.status_progress_period,
            logs_from_time: self.logs_since,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multitrack::{FailMode, TrackTerminationMode};

    #[test]
    fn minimal_manifest_uses_defaults() {
        let manifest = Manifest::from_yaml("deployments:\n  - name: web\n").unwrap();

        assert_eq!(manifest.timeout, Duration::from_secs(300));
        assert_eq!(manifest.status_progress_period, None);
        assert!(manifest.logs_since.is_none());
        assert_eq!(manifest.len(), 1);

        let specs = manifest.specs(&Namespace::default());
        assert_eq!(specs.deployments[0].namespace.as_str(), "default");
        assert_eq!(specs.deployments[0].fail_mode, None);
    }

    #[test]
    fn entry_fields_are_parsed() {
        let yaml = r#"
namespace: production
timeout: 2m
status_progress_period: 0s
logs_since: 2024-01-01T00:00:00Z
jobs:
  - name: migrate
    termination: NonBlocking
    fail_mode: HopeUntilEndOfDeployProcess
    allow_failures_count: 3
    failure_threshold: 30s
    ignore_readiness_probe_fails:
      sidecar: 1m
    log_regex: "ERROR|WARN"
    log_regex_by_container:
      app: panic
    skip_logs_for_containers: [istio-proxy]
    show_service_messages: true
"#;
        let manifest = Manifest::from_yaml(yaml).unwrap();
        assert_eq!(manifest.timeout, Duration::from_secs(120));
        assert_eq!(manifest.status_progress_period, Some(Duration::ZERO));
        assert!(manifest.logs_since.is_some());

        let specs = manifest.specs(&Namespace::default());
        let job = &specs.jobs[0];
        assert_eq!(job.name.as_str(), "migrate");
        assert_eq!(job.namespace.as_str(), "production");
        assert_eq!(job.termination_mode, Some(TrackTerminationMode::NonBlocking));
        assert_eq!(job.fail_mode, Some(FailMode::HopeUntilEndOfDeployProcess));
        assert_eq!(job.allow_failures_count, Some(3));
        assert_eq!(job.failure_threshold, Some(Duration::from_secs(30)));
        assert_eq!(
            job.ignore_readiness_probe_fails_by_container.get("sidecar"),
            Some(&Duration::from_secs(60))
        );
        assert!(job.display.accepts_line("app", "thread panicked"));
        assert!(!job.display.accepts_line("app", "ERROR but no match"));
        assert!(job.display.accepts_line("worker", "WARN disk"));
        assert!(!job.display.shows_container("istio-proxy"));
        assert!(job.display.show_service_messages);
    }

    #[test]
    fn entry_namespace_wins() {
        let yaml = "namespace: staging\ndeployments:\n  - name: web\n    namespace: edge\n  - name: api\n";
        let specs = Manifest::from_yaml(yaml)
            .unwrap()
            .specs(&Namespace::new("cli").unwrap());

        assert_eq!(specs.deployments[0].namespace.as_str(), "edge");
        assert_eq!(specs.deployments[1].namespace.as_str(), "staging");
    }

    #[test]
    fn fallback_namespace_applies_without_manifest_namespace() {
        let specs = Manifest::from_yaml("canaries:\n  - name: front\n")
            .unwrap()
            .specs(&Namespace::new("cli").unwrap());
        assert_eq!(specs.canaries[0].namespace.as_str(), "cli");
    }

    #[test]
    fn unknown_fail_mode_is_a_config_error() {
        let err = Manifest::from_yaml("deployments:\n  - name: web\n    fail_mode: Sometimes\n")
            .unwrap_err();
        assert!(matches!(err, Error::Yaml(_)));
    }

    #[test]
    fn invalid_names_and_regexes_are_rejected() {
        assert!(Manifest::from_yaml("deployments:\n  - name: Web_App\n").is_err());
        assert!(Manifest::from_yaml("jobs:\n  - name: seed\n    log_regex: \"(\"\n").is_err());
        assert!(Manifest::from_yaml("namespace: a.b\n").is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(Manifest::from_yaml("deployments:\n  - name: web\n    replicas: 3\n").is_err());
    }

    #[test]
    fn options_carry_run_settings() {
        let manifest = Manifest::from_yaml("timeout: 10s\nstatus_progress_period: 1s\n").unwrap();
        let parent = CancellationToken::new();
        let opts = manifest.options(parent.clone());

        assert_eq!(opts.timeout, Duration::from_secs(10));
        assert_eq!(opts.refresh_period(), Some(Duration::from_secs(1)));
        parent.cancel();
        assert!(opts.parent.is_cancelled());
    }
}
