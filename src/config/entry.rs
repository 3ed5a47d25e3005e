// ABOUTME: One tracked resource as written in the manifest.
// ABOUTME: Converts into a TrackSpec, leaving unset policies to normalization.

use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use super::deserialize::{
    deserialize_duration_map, deserialize_namespace_option, deserialize_regex_map,
    deserialize_regex_option, deserialize_resource_name,
};
use crate::multitrack::{DisplayOptions, FailMode, TrackSpec, TrackTerminationMode};
use crate::types::{Namespace, ResourceName};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceEntry {
    #[serde(deserialize_with = "deserialize_resource_name")]
    pub name: ResourceName,

    #[serde(default, deserialize_with = "deserialize_namespace_option")]
    pub namespace: Option<Namespace>,

    #[serde(default)]
    pub termination: Option<TrackTerminationMode>,

    #[serde(default)]
    pub fail_mode: Option<FailMode>,

    #[serde(default)]
    pub allow_failures_count: Option<u32>,

    #[serde(default, with = "humantime_serde")]
    pub failure_threshold: Option<Duration>,

    /// Readiness probe failures of these containers are ignored for the given grace.
    #[serde(default, deserialize_with = "deserialize_duration_map")]
    pub ignore_readiness_probe_fails: HashMap<String, Duration>,

    #[serde(default, deserialize_with = "deserialize_regex_option")]
    pub log_regex: Option<Regex>,

    #[serde(default, deserialize_with = "deserialize_regex_map")]
    pub log_regex_by_container: HashMap<String, Regex>,

    #[serde(default)]
    pub skip_logs: bool,

    #[serde(default)]
    pub skip_logs_for_containers: Vec<String>,

    #[serde(default)]
    pub show_logs_only_for_containers: Vec<String>,

    #[serde(default)]
    pub show_service_messages: bool,
}

impl ResourceEntry {
    /// Build the tracking spec, using `namespace` when the entry has none.
    pub fn into_track_spec(self, namespace: &Namespace) -> TrackSpec {
        TrackSpec {
            name: self.name,
            namespace: self.namespace.unwrap_or_else(|| namespace.clone()),
            termination_mode: self.termination,
            fail_mode: self.fail_mode,
            allow_failures_count: self.allow_failures_count,
            failure_threshold: self.failure_threshold,
            ignore_readiness_probe_fails_by_container: self.ignore_readiness_probe_fails,
            display: DisplayOptions {
                log_regex: self.log_regex,
                log_regex_by_container: self.log_regex_by_container,
                skip_logs: self.skip_logs,
                skip_logs_for_containers: self.skip_logs_for_containers,
                show_logs_only_for_containers: self.show_logs_only_for_containers,
                show_service_messages: self.show_service_messages,
            },
        }
    }
}
