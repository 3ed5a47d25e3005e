// ABOUTME: Per-resource lifecycle state machine and fail-mode policies.
// ABOUTME: Interprets ready and failure signals into lifecycle transitions.

use serde::Serialize;
use std::fmt;

use super::spec::FailMode;

/// Failure reasons carrying this marker can never recover by waiting.
pub const NEVER_PULL_MARKER: &str = "ErrImageNeverPull";

/// Lifecycle of a tracked resource.
///
/// `Hoping` and `ActiveAfterHoping` are only used under
/// [`FailMode::HopeUntilEndOfDeployProcess`]. `Succeeded` and `Failed` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    #[default]
    Active,
    Hoping,
    ActiveAfterHoping,
    Succeeded,
    Failed,
}

impl LifecycleStatus {
    /// Number of states, which bounds any chain of immediate re-evaluations.
    const COUNT: usize = 5;

    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleStatus::Succeeded | LifecycleStatus::Failed)
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleStatus::Active => "active",
            LifecycleStatus::Hoping => "hoping",
            LifecycleStatus::ActiveAfterHoping => "active after hoping",
            LifecycleStatus::Succeeded => "succeeded",
            LifecycleStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Informational outcome of a failure signal, rendered as a service message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    AllowedFailure { count: u32, allowed: u32 },
    CriticalFailure,
    AllowedExceeded { allowed: u32 },
    Hoping { waiting_for: Vec<String> },
    Ignored { count: u32 },
}

impl Notice {
    /// Message text for `resource`, e.g. `deploy/web`.
    pub fn message(&self, resource: &str) -> String {
        match self {
            Notice::AllowedFailure { count, allowed } => format!(
                "{count}/{allowed} allowed errors occurred for {resource}: continue tracking"
            ),
            Notice::CriticalFailure => {
                format!("Critical failure occurred for {resource}: stop tracking immediately!")
            }
            Notice::AllowedExceeded { allowed } => format!(
                "Allowed failures count for {resource} exceeded {allowed} errors: stop tracking immediately!"
            ),
            Notice::Hoping { waiting_for } => format!(
                "Error occurred for {resource}, waiting until following resources are ready \
                 before counting errors (HopeUntilEndOfDeployProcess fail mode is active): {}",
                waiting_for.join(", ")
            ),
            Notice::Ignored { count } => format!("{count} errors occurred for {resource}"),
        }
    }
}

/// What the tracker should do after a failure was recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Keep tracking.
    Tolerated(Notice),
    /// The resource failed; the whole run must abort.
    Abort(Notice),
}

/// A signal arrived that the lifecycle can never legitimately receive.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("tracker reported failure while in unexpected state {status} ({mode:?})")]
    UnexpectedState {
        status: LifecycleStatus,
        mode: FailMode,
    },

    #[error("tracker reported readiness after the resource already failed")]
    ReadyAfterFailure,

    #[error("state re-evaluation did not settle within {0} transitions")]
    TransitionLimit(usize),
}

enum Step {
    Advance,
    Settle(FailureOutcome),
}

/// Mutable lifecycle record of one resource. Only touched under the registry lock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceState {
    pub status: LifecycleStatus,
    /// Failures counted against the allowed budget.
    pub failures_count: u32,
    /// Failures tolerated while hoping, never counted against the budget.
    pub hoping_failures_count: u32,
    pub failed_reason: Option<String>,
}

impl ResourceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record readiness. The tracker is told to stop afterwards.
    pub fn on_ready(&mut self) -> Result<(), InvariantViolation> {
        if self.status == LifecycleStatus::Failed {
            return Err(InvariantViolation::ReadyAfterFailure);
        }
        self.status = LifecycleStatus::Succeeded;
        Ok(())
    }

    /// Record a failure under `fail_mode`.
    ///
    /// `others_active` names every other resource still plainly `Active`; it
    /// is only consulted while hoping.
    pub fn on_failure(
        &mut self,
        fail_mode: FailMode,
        allowed: u32,
        reason: &str,
        others_active: &[String],
    ) -> Result<FailureOutcome, InvariantViolation> {
        match fail_mode {
            FailMode::FailWholeDeployProcessImmediately => {
                self.fail_immediately(allowed, reason)
            }
            FailMode::HopeUntilEndOfDeployProcess => {
                for _ in 0..LifecycleStatus::COUNT {
                    match self.hope_step(allowed, reason, others_active)? {
                        Step::Advance => continue,
                        Step::Settle(outcome) => return Ok(outcome),
                    }
                }
                Err(InvariantViolation::TransitionLimit(LifecycleStatus::COUNT))
            }
            FailMode::IgnoreAndContinueDeployProcess => {
                self.failures_count += 1;
                Ok(FailureOutcome::Tolerated(Notice::Ignored {
                    count: self.failures_count,
                }))
            }
        }
    }

    fn fail_immediately(
        &mut self,
        allowed: u32,
        reason: &str,
    ) -> Result<FailureOutcome, InvariantViolation> {
        if self.status == LifecycleStatus::Succeeded {
            return Err(InvariantViolation::UnexpectedState {
                status: self.status,
                mode: FailMode::FailWholeDeployProcessImmediately,
            });
        }

        let forced = reason.contains(NEVER_PULL_MARKER);
        self.failures_count += 1;

        if !forced && self.status != LifecycleStatus::Failed && self.failures_count <= allowed {
            return Ok(FailureOutcome::Tolerated(Notice::AllowedFailure {
                count: self.failures_count,
                allowed,
            }));
        }

        self.fail(reason);
        let notice = if forced {
            Notice::CriticalFailure
        } else {
            Notice::AllowedExceeded { allowed }
        };
        Ok(FailureOutcome::Abort(notice))
    }

    fn hope_step(
        &mut self,
        allowed: u32,
        reason: &str,
        others_active: &[String],
    ) -> Result<Step, InvariantViolation> {
        match self.status {
            LifecycleStatus::Active => {
                self.status = LifecycleStatus::Hoping;
                Ok(Step::Advance)
            }
            LifecycleStatus::Hoping => {
                if !others_active.is_empty() {
                    self.hoping_failures_count += 1;
                    return Ok(Step::Settle(FailureOutcome::Tolerated(Notice::Hoping {
                        waiting_for: others_active.to_vec(),
                    })));
                }
                self.status = LifecycleStatus::ActiveAfterHoping;
                Ok(Step::Advance)
            }
            LifecycleStatus::ActiveAfterHoping => {
                self.failures_count += 1;
                if self.failures_count <= allowed {
                    return Ok(Step::Settle(FailureOutcome::Tolerated(
                        Notice::AllowedFailure {
                            count: self.failures_count,
                            allowed,
                        },
                    )));
                }
                self.fail(reason);
                Ok(Step::Settle(FailureOutcome::Abort(Notice::AllowedExceeded {
                    allowed,
                })))
            }
            status @ (LifecycleStatus::Succeeded | LifecycleStatus::Failed) => {
                Err(InvariantViolation::UnexpectedState {
                    status,
                    mode: FailMode::HopeUntilEndOfDeployProcess,
                })
            }
        }
    }

    /// The first reason that failed the resource is kept.
    fn fail(&mut self, reason: &str) {
        self.status = LifecycleStatus::Failed;
        self.failed_reason.get_or_insert_with(|| reason.to_string());
    }
}
