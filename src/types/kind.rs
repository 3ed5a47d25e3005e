// ABOUTME: The five workload kinds the multitracker understands.
// ABOUTME: Ordering matches registry iteration and error reporting order.

use serde::Serialize;
use std::fmt;

/// Workload kind of a tracked resource.
///
/// The derived `Ord` is the order in which kinds are iterated, rendered and
/// reported: deployments, statefulsets, daemonsets, jobs, canaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Deployment,
    StatefulSet,
    DaemonSet,
    Job,
    Canary,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Deployment,
        ResourceKind::StatefulSet,
        ResourceKind::DaemonSet,
        ResourceKind::Job,
        ResourceKind::Canary,
    ];

    /// Short prefix used in messages, e.g. `deploy/web`.
    pub fn short_name(&self) -> &'static str {
        match self {
            ResourceKind::Deployment => "deploy",
            ResourceKind::StatefulSet => "sts",
            ResourceKind::DaemonSet => "ds",
            ResourceKind::Job => "job",
            ResourceKind::Canary => "canary",
        }
    }

    /// Resource type argument understood by `kubectl get`.
    pub fn api_resource(&self) -> &'static str {
        match self {
            ResourceKind::Deployment => "deployment",
            ResourceKind::StatefulSet => "statefulset",
            ResourceKind::DaemonSet => "daemonset",
            ResourceKind::Job => "job",
            ResourceKind::Canary => "canaries.flagger.app",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_sort_in_reporting_order() {
        let mut kinds = vec![
            ResourceKind::Canary,
            ResourceKind::Job,
            ResourceKind::Deployment,
            ResourceKind::DaemonSet,
            ResourceKind::StatefulSet,
        ];
        kinds.sort();
        assert_eq!(kinds, ResourceKind::ALL.to_vec());
    }

    #[test]
    fn short_names_match_kubectl_abbreviations() {
        assert_eq!(ResourceKind::Deployment.to_string(), "deploy");
        assert_eq!(ResourceKind::StatefulSet.to_string(), "sts");
        assert_eq!(ResourceKind::DaemonSet.to_string(), "ds");
        assert_eq!(ResourceKind::Job.to_string(), "job");
        assert_eq!(ResourceKind::Canary.to_string(), "canary");
    }
}
