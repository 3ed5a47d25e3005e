// ABOUTME: Tracker feedback for tracking a single resource outside a multitrack run.
// ABOUTME: Follow mode tolerates failures forever; rollout mode fails on the first one.

use parking_lot::Mutex;
use rolltrack::multitrack::{ResourceStatus, TrackFeedback, TrackSignal, TrackerError};
use rolltrack::output::Output;
use std::sync::atomic::{AtomicBool, Ordering};

/// How failures of a single tracked resource are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Report failures and keep tracking.
    Follow,
    /// The first failure ends tracking with an error.
    FailFast,
}

pub struct StandaloneFeedback<'a> {
    label: String,
    policy: Policy,
    output: &'a Output,
    ready: AtomicBool,
    last_status: Mutex<Option<String>>,
}

impl<'a> StandaloneFeedback<'a> {
    pub fn new(label: String, policy: Policy, output: &'a Output) -> Self {
        Self {
            label,
            policy,
            output,
            ready: AtomicBool::new(false),
            last_status: Mutex::new(None),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

impl TrackFeedback for StandaloneFeedback<'_> {
    fn ready(&self) -> Result<TrackSignal, TrackerError> {
        self.ready.store(true, Ordering::SeqCst);
        Ok(TrackSignal::Stop)
    }

    fn failed(&self, reason: &str) -> Result<TrackSignal, TrackerError> {
        match self.policy {
            Policy::Follow => {
                self.output.progress(&format!("{}: {reason}", self.label));
                tracing::warn!(resource = %self.label, "{reason}");
                Ok(TrackSignal::Continue)
            }
            Policy::FailFast => Err(TrackerError::Other(reason.to_string())),
        }
    }

    fn status(&self, status: ResourceStatus) {
        let summary = status.summary();
        let mut last = self.last_status.lock();
        if last.as_deref() != Some(summary.as_str()) {
            self.output.progress(&format!("{}: {summary}", self.label));
            *last = Some(summary);
        }
    }
}
