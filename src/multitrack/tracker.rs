// ABOUTME: Contract between the multitracker and per-kind resource trackers.
// ABOUTME: Trackers block until ready, failed, stopped or cancelled, reporting through feedback.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use super::options::TrackerOptions;
use super::spec::ResolvedSpec;
use super::status::ResourceStatus;
use crate::types::ResourceKind;

/// What a tracker should do after reporting readiness or a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum TrackSignal {
    /// Keep watching the resource.
    Continue,
    /// Stop tracking and return `Ok(())`. This is success, not an error.
    Stop,
}

/// Errors a tracker returns, or is handed by its feedback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    /// The failure budget of the resource is exhausted; the run must abort.
    #[error("fail whole deploy process immediately")]
    FailWholeDeployProcess,

    /// The feedback handler hit a state it can never legitimately reach.
    #[error("internal error: {0}")]
    Internal(String),

    /// Talking to the cluster failed.
    #[error("cluster access failed: {0}")]
    Cluster(String),

    #[error("{0}")]
    Other(String),
}

/// Callback surface handed to a tracker for the duration of one `track` call.
pub trait TrackFeedback: Send + Sync {
    /// The resource became ready. Trackers must stop on [`TrackSignal::Stop`].
    fn ready(&self) -> Result<TrackSignal, TrackerError>;

    /// A failure condition was observed. May be called repeatedly while the
    /// fail-mode policy answers [`TrackSignal::Continue`].
    fn failed(&self, reason: &str) -> Result<TrackSignal, TrackerError>;

    /// Latest progress status, best effort.
    fn status(&self, status: ResourceStatus);
}

/// Everything a tracker needs to watch one resource.
#[derive(Debug, Clone)]
pub struct TrackRequest {
    pub kind: ResourceKind,
    pub spec: ResolvedSpec,
    pub options: TrackerOptions,
}

impl TrackRequest {
    /// `kind/name` label used in messages.
    pub fn label(&self) -> String {
        format!("{}/{}", self.kind, self.spec.name)
    }
}

/// Watches one named resource until it is ready, failed, stopped or cancelled.
///
/// Implementations return `Ok(())` when feedback answers
/// [`TrackSignal::Stop`] and when `request.options.cancel` fires, and
/// propagate errors handed back by feedback unchanged.
#[async_trait]
pub trait ResourceTracker: Send + Sync {
    async fn track(
        &self,
        request: &TrackRequest,
        feedback: &dyn TrackFeedback,
    ) -> Result<(), TrackerError>;
}

/// One tracker per workload kind.
#[derive(Clone)]
pub struct TrackerSet {
    pub deployment: Arc<dyn ResourceTracker>,
    pub statefulset: Arc<dyn ResourceTracker>,
    pub daemonset: Arc<dyn ResourceTracker>,
    pub job: Arc<dyn ResourceTracker>,
    pub canary: Arc<dyn ResourceTracker>,
}

impl TrackerSet {
    /// Use the same tracker for every kind.
    pub fn uniform(tracker: Arc<dyn ResourceTracker>) -> Self {
        Self {
            deployment: tracker.clone(),
            statefulset: tracker.clone(),
            daemonset: tracker.clone(),
            job: tracker.clone(),
            canary: tracker,
        }
    }

    pub fn get(&self, kind: ResourceKind) -> Arc<dyn ResourceTracker> {
        match kind {
            ResourceKind::Deployment => self.deployment.clone(),
            ResourceKind::StatefulSet => self.statefulset.clone(),
            ResourceKind::DaemonSet => self.daemonset.clone(),
            ResourceKind::Job => self.job.clone(),
            ResourceKind::Canary => self.canary.clone(),
        }
    }
}

impl fmt::Debug for TrackerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackerSet").finish_non_exhaustive()
    }
}
