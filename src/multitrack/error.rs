// ABOUTME: Error types for a multitrack run.
// ABOUTME: Exactly one of these, or success, is produced per run.

use std::fmt;

use super::display::RenderError;
use super::tracker::TrackerError;
use crate::types::{ResourceKind, ResourceName};

/// A resource that ended in the failed state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedResource {
    pub kind: ResourceKind,
    pub name: ResourceName,
    pub reason: String,
}

impl fmt::Display for FailedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} failed: {}", self.kind, self.name, self.reason)
    }
}

/// Errors that end a multitrack run.
#[derive(Debug, thiserror::Error)]
pub enum MultitrackError {
    /// One or more resources failed; one line per resource.
    #[error("{}", join_lines(.0))]
    ResourcesFailed(Vec<FailedResource>),

    /// A tracker returned an error the multitracker does not recognize.
    #[error("{kind}/{name} track failed: {source}")]
    TrackerFailed {
        kind: ResourceKind,
        name: ResourceName,
        #[source]
        source: TrackerError,
    },

    /// A logic defect was detected; never a user-facing condition.
    #[error("internal error: {0}")]
    Internal(String),

    #[error("unable to display status: {0}")]
    Render(#[from] RenderError),
}

fn join_lines(failed: &[FailedResource]) -> String {
    failed
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

impl MultitrackError {
    /// Failed resources carried by this error, if any.
    pub fn failed_resources(&self) -> &[FailedResource] {
        match self {
            MultitrackError::ResourcesFailed(failed) => failed,
            _ => &[],
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, MultitrackError::Internal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(kind: ResourceKind, name: &str, reason: &str) -> FailedResource {
        FailedResource {
            kind,
            name: ResourceName::new(name).unwrap(),
            reason: reason.to_string(),
        }
    }

    #[test]
    fn consolidated_message_has_one_line_per_resource() {
        let err = MultitrackError::ResourcesFailed(vec![
            failed(ResourceKind::Deployment, "web", "CrashLoopBackOff"),
            failed(ResourceKind::Canary, "front", "canary analysis failed"),
        ]);
        assert_eq!(
            err.to_string(),
            "deploy/web failed: CrashLoopBackOff\ncanary/front failed: canary analysis failed"
        );
        assert_eq!(err.failed_resources().len(), 2);
    }

    #[test]
    fn unknown_tracker_errors_carry_context() {
        let err = MultitrackError::TrackerFailed {
            kind: ResourceKind::Job,
            name: ResourceName::new("migrate").unwrap(),
            source: TrackerError::Cluster("connection refused".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "job/migrate track failed: cluster access failed: connection refused"
        );
    }

    #[test]
    fn internal_errors_are_labeled() {
        let err = MultitrackError::Internal("bad state".to_string());
        assert!(err.is_internal());
        assert_eq!(err.to_string(), "internal error: bad state");
    }
}
