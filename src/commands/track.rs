// ABOUTME: Single-resource follow and rollout-track command implementations.
// ABOUTME: Drives one kubectl tracker with standalone feedback.

use super::feedback::{Policy, StandaloneFeedback};
use rolltrack::error::{Error, Result};
use rolltrack::kubectl::{Kubectl, KubectlTracker, Target};
use rolltrack::multitrack::{TrackSpec, TrackerError, TrackerOptions};
use rolltrack::output::{Output, OutputMode};
use rolltrack::types::{Namespace, ResourceKind, ResourceName};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Track one job, deployment or pod until it is ready.
///
/// Under [`Policy::Follow`] failures are printed and tracking continues, and
/// an interrupt ends tracking quietly.
pub async fn track_one(
    kubectl: Kubectl,
    target: Target,
    name: &str,
    namespace: Namespace,
    timeout: Duration,
    policy: Policy,
    mut output: Output,
    cancel: CancellationToken,
) -> Result<()> {
    let name = ResourceName::new(name).map_err(|e| Error::InvalidConfig(e.to_string()))?;
    let label = target.label(&name);

    // Fail-mode fields only matter inside a multitrack run.
    let kind = match target {
        Target::Workload(kind) => kind,
        Target::Pod => ResourceKind::Deployment,
    };
    let spec = TrackSpec::new(name).namespace(namespace).resolve(kind);
    let options = TrackerOptions::new(cancel.clone(), timeout);

    let tracker =
        KubectlTracker::new(kubectl).show_logs(output.mode() != OutputMode::Json);

    output.start_timer();
    output.progress(&format!("Tracking {label} in namespace {}", spec.namespace));

    let feedback = StandaloneFeedback::new(label.clone(), policy, &output);
    let result = tracker
        .track_target(target, &spec, &options, &feedback)
        .await;

    match result {
        Ok(()) if feedback.is_ready() => {
            output.success(&format!("{label} is ready"));
            Ok(())
        }
        Ok(()) if policy == Policy::Follow => {
            output.progress(&format!("Stopped following {label}"));
            Ok(())
        }
        Ok(()) => Err(Error::Interrupted),
        Err(TrackerError::Other(reason)) => Err(Error::Tracking {
            resource: label,
            reason,
        }),
        Err(e) => Err(Error::Tracking {
            resource: label,
            reason: e.to_string(),
        }),
    }
}
