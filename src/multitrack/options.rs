// ABOUTME: Process-wide run options and the per-resource options bundle.
// ABOUTME: Every resource gets its own cancellation token derived from the run scope.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_STATUS_PROGRESS_PERIOD: Duration = Duration::from_secs(5);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Options for one multitrack run.
#[derive(Debug, Clone)]
pub struct MultitrackOptions {
    /// Process-wide cancellation scope. Cancelling it stops every tracker.
    pub parent: CancellationToken,
    /// Timeout handed to each resource tracker.
    pub timeout: Duration,
    /// Status refresh period. `None` means the 5s default,
    /// `Some(Duration::ZERO)` disables periodic refresh.
    pub status_progress_period: Option<Duration>,
    /// Replay logs emitted after this point in time.
    pub logs_from_time: Option<DateTime<Utc>>,
}

impl Default for MultitrackOptions {
    fn default() -> Self {
        Self {
            parent: CancellationToken::new(),
            timeout: DEFAULT_TIMEOUT,
            status_progress_period: None,
            logs_from_time: None,
        }
    }
}

impl MultitrackOptions {
    /// Effective refresh period, `None` when periodic refresh is disabled.
    pub fn refresh_period(&self) -> Option<Duration> {
        match self.status_progress_period {
            None => Some(DEFAULT_STATUS_PROGRESS_PERIOD),
            Some(period) if period.is_zero() => None,
            Some(period) => Some(period),
        }
    }

    /// Options bundle for a single resource tracker.
    pub(crate) fn for_resource(
        &self,
        cancel: CancellationToken,
        ignore_readiness_probe_fails_by_container: HashMap<String, Duration>,
    ) -> TrackerOptions {
        TrackerOptions {
            cancel,
            timeout: self.timeout,
            status_progress_period: self.refresh_period(),
            logs_from_time: self.logs_from_time,
            ignore_readiness_probe_fails_by_container,
        }
    }
}

/// Options handed to a resource tracker.
#[derive(Debug, Clone)]
pub struct TrackerOptions {
    /// Cancelled when the tracker must stop early. Cancellation is a benign stop.
    pub cancel: CancellationToken,
    /// Exceeding it is reported through the ordinary failure callback.
    pub timeout: Duration,
    pub status_progress_period: Option<Duration>,
    pub logs_from_time: Option<DateTime<Utc>>,
    /// Readiness probe failures of these containers are ignored for the given grace.
    pub ignore_readiness_probe_fails_by_container: HashMap<String, Duration>,
}

impl TrackerOptions {
    /// Standalone options outside a multitrack run.
    pub fn new(cancel: CancellationToken, timeout: Duration) -> Self {
        Self {
            cancel,
            timeout,
            status_progress_period: Some(DEFAULT_STATUS_PROGRESS_PERIOD),
            logs_from_time: None,
            ignore_readiness_probe_fails_by_container: HashMap::new(),
        }
    }
}
