// ABOUTME: Shared registry of every tracked resource for one run.
// ABOUTME: Holds spec, cancellation scope, lifecycle state and statuses per (kind, name).

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::display::{ResourceSnapshot, StatusSnapshot};
use super::error::{FailedResource, MultitrackError};
use super::spec::ResolvedSpec;
use super::state::{FailureOutcome, LifecycleStatus, ResourceState};
use super::status::ResourceStatus;
use super::tracker::{TrackSignal, TrackerError};
use crate::types::{ResourceKind, ResourceName};

pub(crate) type SharedRegistry = Arc<Mutex<Registry>>;

/// Identity of a tracked resource. Orders by kind, then name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceKey {
    pub kind: ResourceKind,
    pub name: ResourceName,
}

impl ResourceKey {
    pub fn new(kind: ResourceKind, name: ResourceName) -> Self {
        Self { kind, name }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

#[derive(Debug)]
pub(crate) struct Entry {
    pub(crate) spec: ResolvedSpec,
    /// Present while the tracker is in flight.
    pub(crate) cancel: Option<CancellationToken>,
    pub(crate) state: ResourceState,
    status: Option<ResourceStatus>,
    prev_status: Option<ResourceStatus>,
    service_messages: Vec<String>,
    fault: Option<String>,
}

/// Every tracked resource of a run. Only mutated under the run's mutex.
#[derive(Debug, Default)]
pub struct Registry {
    pub(crate) entries: BTreeMap<ResourceKey, Entry>,
    pub(crate) terminating: bool,
    concluded: bool,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource. Entries are never removed during a run.
    pub fn insert(
        &mut self,
        kind: ResourceKind,
        spec: ResolvedSpec,
        cancel: CancellationToken,
    ) -> ResourceKey {
        let key = ResourceKey::new(kind, spec.name.clone());
        self.entries.insert(
            key.clone(),
            Entry {
                spec,
                cancel: Some(cancel),
                state: ResourceState::new(),
                status: None,
                prev_status: None,
                service_messages: Vec::new(),
                fault: None,
            },
        );
        key
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn state(&self, key: &ResourceKey) -> Option<&ResourceState> {
        self.entries.get(key).map(|e| &e.state)
    }

    /// Whether the tracker of `key` is still in flight.
    pub fn is_in_flight(&self, key: &ResourceKey) -> bool {
        self.entries.get(key).is_some_and(|e| e.cancel.is_some())
    }

    /// Forget the cancellation scope of a tracker that returned.
    pub fn release(&mut self, key: &ResourceKey) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.cancel = None;
        }
    }

    /// Mark the run as concluded. Returns `false` if it already was.
    pub(crate) fn conclude(&mut self) -> bool {
        !std::mem::replace(&mut self.concluded, true)
    }

    pub(crate) fn is_concluded(&self) -> bool {
        self.concluded
    }

    pub fn is_terminating(&self) -> bool {
        self.terminating
    }

    /// Readiness handler: the resource succeeded and its tracker must stop.
    pub fn record_ready(&mut self, key: &ResourceKey) -> Result<TrackSignal, TrackerError> {
        let Some(entry) = self.entries.get_mut(key) else {
            return Err(unknown_resource(key));
        };

        match entry.state.on_ready() {
            Ok(()) => {
                tracing::debug!(resource = %key, "resource is ready");
                Ok(TrackSignal::Stop)
            }
            Err(violation) => Err(entry.record_fault(key, violation.to_string())),
        }
    }

    /// Failure handler: apply the resource's fail mode to `reason`.
    pub fn record_failure(
        &mut self,
        key: &ResourceKey,
        reason: &str,
    ) -> Result<TrackSignal, TrackerError> {
        let others_active = self.active_resource_names(Some(key));
        let Some(entry) = self.entries.get_mut(key) else {
            return Err(unknown_resource(key));
        };

        let outcome = entry.state.on_failure(
            entry.spec.fail_mode,
            entry.spec.allow_failures_count,
            reason,
            &others_active,
        );

        match outcome {
            Ok(FailureOutcome::Tolerated(notice)) => {
                entry.service_message(notice.message(&key.to_string()));
                Ok(TrackSignal::Continue)
            }
            Ok(FailureOutcome::Abort(notice)) => {
                entry.service_message(notice.message(&key.to_string()));
                Err(TrackerError::FailWholeDeployProcess)
            }
            Err(violation) => Err(entry.record_fault(key, violation.to_string())),
        }
    }

    /// Keep the latest status reported for `key`.
    pub fn record_status(&mut self, key: &ResourceKey, status: ResourceStatus) {
        if status.kind() != key.kind {
            tracing::warn!(
                resource = %key,
                reported = %status.kind(),
                "dropping status of mismatched kind"
            );
            return;
        }
        if let Some(entry) = self.entries.get_mut(key) {
            entry.status = Some(status);
        }
    }

    /// Take the invariant violation recorded for `key`, if any.
    pub(crate) fn take_fault(&mut self, key: &ResourceKey) -> Option<String> {
        self.entries.get_mut(key).and_then(|e| e.fault.take())
    }

    /// Resources still plainly `Active`, excluding `except`.
    pub fn active_resource_names(&self, except: Option<&ResourceKey>) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(key, entry)| {
                Some(*key) != except && entry.state.status == LifecycleStatus::Active
            })
            .map(|(key, _)| key.to_string())
            .collect()
    }

    /// Whether any deployment, statefulset, daemonset or job failed.
    ///
    /// Canaries are not considered here; their failures abort the run
    /// through the tracker path instead.
    pub fn has_failed_resources(&self) -> bool {
        self.entries.iter().any(|(key, entry)| {
            key.kind != ResourceKind::Canary && entry.state.status == LifecycleStatus::Failed
        })
    }

    /// Every failed resource, canaries included, sorted by kind and name.
    pub fn failed_resources(&self) -> Vec<FailedResource> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.state.status == LifecycleStatus::Failed)
            .map(|(key, entry)| FailedResource {
                kind: key.kind,
                name: key.name.clone(),
                reason: entry.state.failed_reason.clone().unwrap_or_default(),
            })
            .collect()
    }

    /// Consolidated error built from every failed resource.
    pub fn failure_error(&self) -> MultitrackError {
        MultitrackError::ResourcesFailed(self.failed_resources())
    }

    /// Repeat the service messages collected for failed resources.
    pub fn display_failed_service_messages(&self) {
        for (key, entry) in &self.entries {
            if entry.state.status != LifecycleStatus::Failed {
                continue;
            }
            for message in &entry.service_messages {
                tracing::warn!(resource = %key, "{message}");
            }
        }
    }

    /// Service messages collected for `key`.
    pub fn service_messages(&self, key: &ResourceKey) -> &[String] {
        self.entries
            .get(key)
            .map(|e| e.service_messages.as_slice())
            .unwrap_or(&[])
    }

    /// Snapshot every resource; the current status becomes the previous one.
    pub fn snapshot(&mut self, final_render: bool) -> StatusSnapshot {
        let resources = self
            .entries
            .iter_mut()
            .map(|(key, entry)| {
                let changed = entry.status != entry.prev_status;
                entry.prev_status = entry.status.clone();
                ResourceSnapshot {
                    kind: key.kind,
                    name: key.name.to_string(),
                    namespace: entry.spec.namespace.to_string(),
                    lifecycle: entry.state.status,
                    failures_count: entry.state.failures_count,
                    allow_failures_count: entry.spec.allow_failures_count,
                    status: entry.status.clone(),
                    changed,
                }
            })
            .collect();

        StatusSnapshot {
            resources,
            final_render,
        }
    }
}

impl Entry {
    fn service_message(&mut self, message: String) {
        if self.spec.display.show_service_messages {
            tracing::info!("{message}");
        } else {
            tracing::debug!("{message}");
        }
        self.service_messages.push(message);
    }

    fn record_fault(&mut self, key: &ResourceKey, message: String) -> TrackerError {
        tracing::error!(resource = %key, "internal error: {message}");
        self.fault.get_or_insert_with(|| message.clone());
        TrackerError::Internal(format!("{key}: {message}"))
    }
}

fn unknown_resource(key: &ResourceKey) -> TrackerError {
    TrackerError::Internal(format!("{key} is not registered"))
}
