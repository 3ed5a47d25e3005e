// ABOUTME: Cluster access through the kubectl binary.
// ABOUTME: Provides resource trackers that poll objects and evaluate their readiness.

mod client;
mod error;
mod evaluate;
mod tracker;

pub use client::{KUBECTL_ENV, Kubectl};
pub use error::{KubectlError, KubectlErrorKind};
pub use evaluate::{
    Evaluation, FAILURE_REASONS, Failure, PodReport, evaluate, evaluate_pod, parse_log_line,
    selector,
};
pub use tracker::{DEFAULT_POLL_INTERVAL, KubectlTracker, Target};

use std::sync::Arc;

use crate::multitrack::TrackerSet;

/// Trackers for every workload kind backed by `tracker`.
pub fn tracker_set(tracker: KubectlTracker) -> TrackerSet {
    TrackerSet::uniform(Arc::new(tracker))
}
