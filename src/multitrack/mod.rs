// ABOUTME: Concurrent tracking of many Kubernetes workloads with one verdict.
// ABOUTME: Fail-mode and termination policy live here; cluster access lives in trackers.

mod display;
mod error;
mod feedback;
mod multitracker;
mod options;
mod registry;
mod spec;
mod state;
mod status;
mod termination;
mod tracker;

pub use display::{NoopRenderer, RenderError, ResourceSnapshot, StatusRenderer, StatusSnapshot};
pub use error::{FailedResource, MultitrackError};
pub use multitracker::{Multitracker, multitrack};
pub use options::{
    DEFAULT_STATUS_PROGRESS_PERIOD, DEFAULT_TIMEOUT, MultitrackOptions, TrackerOptions,
};
pub use registry::{Registry, ResourceKey};
pub use spec::{
    DEFAULT_ALLOW_FAILURES_COUNT, DisplayOptions, FailMode, MultitrackSpecs, ResolvedSpec,
    TrackSpec, TrackTerminationMode,
};
pub use state::{
    FailureOutcome, InvariantViolation, LifecycleStatus, NEVER_PULL_MARKER, Notice, ResourceState,
};
pub use status::{CanaryStatus, JobStatus, ReplicaStatus, ResourceStatus};
pub use termination::TerminationDecision;
pub use tracker::{
    ResourceTracker, TrackFeedback, TrackRequest, TrackSignal, TrackerError, TrackerSet,
};

/// Result type for multitrack runs.
pub type Result<T> = std::result::Result<T, MultitrackError>;
