// ABOUTME: Kubectl error types with SNAFU pattern.
// ABOUTME: Distinguishes spawn, exit-status, missing-resource and decode failures.

use snafu::Snafu;

use crate::multitrack::TrackerError;

/// Errors from running `kubectl`.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum KubectlError {
    #[snafu(display("failed to run {program}: {source}"))]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[snafu(display("kubectl {args} exited with status {code:?}: {stderr}"))]
    Command {
        args: String,
        code: Option<i32>,
        stderr: String,
    },

    #[snafu(display("{resource} not found"))]
    NotFound { resource: String },

    #[snafu(display("unexpected kubectl output for {resource}: {source}"))]
    Decode {
        resource: String,
        source: serde_json::Error,
    },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KubectlErrorKind {
    /// kubectl could not be started.
    NotInstalled,
    /// kubectl ran and reported an error.
    CommandFailed,
    /// The requested object does not exist (yet).
    NotFound,
    /// kubectl printed something that is not the expected JSON.
    InvalidOutput,
}

impl KubectlError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> KubectlErrorKind {
        match self {
            KubectlError::Spawn { .. } => KubectlErrorKind::NotInstalled,
            KubectlError::Command { .. } => KubectlErrorKind::CommandFailed,
            KubectlError::NotFound { .. } => KubectlErrorKind::NotFound,
            KubectlError::Decode { .. } => KubectlErrorKind::InvalidOutput,
        }
    }
}

impl From<KubectlError> for TrackerError {
    fn from(err: KubectlError) -> Self {
        TrackerError::Cluster(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_classifies_errors() {
        let err = KubectlError::NotFound {
            resource: "deployment/web".to_string(),
        };
        assert_eq!(err.kind(), KubectlErrorKind::NotFound);
        assert_eq!(err.to_string(), "deployment/web not found");

        let err = KubectlError::Command {
            args: "get job seed".to_string(),
            code: Some(1),
            stderr: "forbidden".to_string(),
        };
        assert_eq!(err.kind(), KubectlErrorKind::CommandFailed);
    }

    #[test]
    fn converts_into_cluster_tracker_error() {
        let err: TrackerError = KubectlError::Command {
            args: "get deployment web".to_string(),
            code: Some(1),
            stderr: "connection refused".to_string(),
        }
        .into();
        assert!(matches!(err, TrackerError::Cluster(msg) if msg.contains("connection refused")));
    }
}
