// ABOUTME: OS shutdown signal handling for the CLI.
// ABOUTME: SIGINT, SIGTERM and SIGQUIT cancel the process-wide tracking scope.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Completes when the process receives a termination signal.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Cancel `scope` on the first shutdown signal.
///
/// The watcher ends on its own once `scope` is cancelled for another reason.
pub fn cancel_on_shutdown_signal(scope: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = scope.cancelled() => {}
            signal = wait_for_shutdown_signal() => match signal {
                Ok(()) => {
                    tracing::warn!("shutdown signal received, stopping trackers");
                    scope.cancel();
                }
                Err(e) => tracing::warn!("unable to listen for shutdown signals: {e}"),
            },
        }
    })
}
