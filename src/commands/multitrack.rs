// ABOUTME: Multitrack command implementation.
// ABOUTME: Tracks every resource of a manifest concurrently with console status output.

use rolltrack::config::Manifest;
use rolltrack::error::{Error, Result};
use rolltrack::kubectl::{Kubectl, KubectlTracker, tracker_set};
use rolltrack::multitrack::Multitracker;
use rolltrack::output::{ConsoleRenderer, Output, OutputMode};
use rolltrack::types::Namespace;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Track the manifest's resources until all are ready or the run fails.
pub async fn multitrack(
    kubectl: Kubectl,
    manifest: Manifest,
    namespace: &Namespace,
    timeout: Option<Duration>,
    mut output: Output,
    cancel: CancellationToken,
) -> Result<()> {
    if manifest.is_empty() {
        output.success("Nothing to track");
        return Ok(());
    }

    let specs = manifest.specs(namespace);
    let mut options = manifest.options(cancel.clone());
    if let Some(timeout) = timeout {
        options.timeout = timeout;
    }

    let tracker =
        KubectlTracker::new(kubectl).show_logs(output.mode() != OutputMode::Json);
    let multitracker = Multitracker::new(tracker_set(tracker))
        .with_renderer(Arc::new(ConsoleRenderer::new(output.mode())));

    output.start_timer();
    output.progress(&format!("Tracking {} resource(s)", specs.len()));

    multitracker.run(specs, options).await?;

    if cancel.is_cancelled() {
        return Err(Error::Interrupted);
    }

    output.success("All resources are ready");
    Ok(())
}
