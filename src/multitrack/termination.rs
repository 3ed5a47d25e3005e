// ABOUTME: Termination policy applied after every tracker completion.
// ABOUTME: Cancels remaining trackers once every in-flight resource is non-blocking.

use super::registry::{Registry, ResourceKey};
use super::spec::TrackTerminationMode;

/// Result of evaluating the termination policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationDecision {
    /// Termination already fired earlier in the run.
    AlreadyTerminating,
    /// `blocking` waits until ready, so everything keeps running.
    Continue { blocking: ResourceKey },
    /// Every in-flight tracker was cancelled.
    Terminated { cancelled: Vec<ResourceKey> },
}

impl Registry {
    /// Cancel every in-flight tracker if none of them is required to become ready.
    ///
    /// A single in-flight `WaitUntilResourceReady` resource anywhere keeps the
    /// whole run going. Fires at most once per run.
    pub fn apply_termination_mode(&mut self) -> TerminationDecision {
        if self.terminating {
            return TerminationDecision::AlreadyTerminating;
        }

        let mut to_stop = Vec::new();
        for (key, entry) in &self.entries {
            let Some(cancel) = &entry.cancel else {
                continue;
            };
            match entry.spec.termination_mode {
                TrackTerminationMode::WaitUntilResourceReady => {
                    return TerminationDecision::Continue {
                        blocking: key.clone(),
                    };
                }
                TrackTerminationMode::NonBlocking => to_stop.push((key.clone(), cancel.clone())),
            }
        }

        self.terminating = true;

        let cancelled = to_stop
            .into_iter()
            .map(|(key, cancel)| {
                tracing::debug!(resource = %key, "will stop context for {key}");
                cancel.cancel();
                key
            })
            .collect();

        TerminationDecision::Terminated { cancelled }
    }
}
