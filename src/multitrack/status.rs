// ABOUTME: Kind-tagged progress status reported by resource trackers.
// ABOUTME: The registry keeps the latest and the previously rendered status per resource.

use serde::Serialize;

use crate::types::ResourceKind;

/// Replica counters of a pod controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplicaStatus {
    pub desired: u32,
    pub updated: u32,
    pub ready: u32,
    pub available: u32,
    pub is_ready: bool,
    /// Human readable conditions the controller still waits for.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub waiting_for: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobStatus {
    pub active: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub is_complete: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CanaryStatus {
    pub phase: String,
    pub canary_weight: u32,
    pub failed_checks: u32,
}

/// Latest progress of a tracked resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResourceStatus {
    Deployment(ReplicaStatus),
    StatefulSet(ReplicaStatus),
    DaemonSet(ReplicaStatus),
    Job(JobStatus),
    Canary(CanaryStatus),
}

impl ResourceStatus {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceStatus::Deployment(_) => ResourceKind::Deployment,
            ResourceStatus::StatefulSet(_) => ResourceKind::StatefulSet,
            ResourceStatus::DaemonSet(_) => ResourceKind::DaemonSet,
            ResourceStatus::Job(_) => ResourceKind::Job,
            ResourceStatus::Canary(_) => ResourceKind::Canary,
        }
    }

    /// Short one-line summary for table rendering.
    pub fn summary(&self) -> String {
        match self {
            ResourceStatus::Deployment(s)
            | ResourceStatus::StatefulSet(s)
            | ResourceStatus::DaemonSet(s) => format!(
                "replicas {}/{} up-to-date {} available {}",
                s.ready, s.desired, s.updated, s.available
            ),
            ResourceStatus::Job(s) => format!(
                "active {} succeeded {} failed {}",
                s.active, s.succeeded, s.failed
            ),
            ResourceStatus::Canary(s) => format!(
                "phase {} weight {}% failed checks {}",
                s.phase, s.canary_weight, s.failed_checks
            ),
        }
    }
}
