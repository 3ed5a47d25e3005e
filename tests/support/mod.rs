// ABOUTME: Test support utilities.
// ABOUTME: Provides scripted trackers and a recording renderer for multitrack tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use rolltrack::multitrack::{
    RenderError, ResourceStatus, ResourceTracker, StatusRenderer, StatusSnapshot, TrackFeedback,
    TrackRequest, TrackSignal, TrackSpec, TrackerError,
};
use rolltrack::types::ResourceName;
use std::collections::HashMap;
use std::sync::{Arc, Once};
use std::time::Duration;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter =
            EnvFilter::from_default_env().add_directive("rolltrack=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

#[allow(dead_code)]
pub fn spec(name: &str) -> TrackSpec {
    TrackSpec::new(ResourceName::new(name).unwrap())
}

/// One scripted tracker action.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum Step {
    /// Report readiness and stop when told to.
    Ready,
    /// Report readiness and ignore the answer.
    ReadyIgnoringStop,
    /// Report a failure, propagating errors from feedback.
    Fail(&'static str),
    /// Report a failure and ignore whatever feedback answers.
    FailSwallowingErrors(&'static str),
    Status(ResourceStatus),
    /// Sleep, returning early when cancelled.
    Sleep(Duration),
    /// Return this error.
    Error(TrackerError),
    /// Return `Ok(())` without reporting anything.
    Return,
    Panic,
}

/// Tracker that replays a script per `kind/name` label, then blocks until cancelled.
#[allow(dead_code)]
#[derive(Default)]
pub struct ScriptedTracker {
    scripts: Mutex<HashMap<String, Vec<Step>>>,
    events: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl ScriptedTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(self: &Arc<Self>, label: &str, steps: Vec<Step>) -> Arc<Self> {
        self.scripts.lock().insert(label.to_string(), steps);
        Arc::clone(self)
    }

    /// Recorded events such as `deploy/web ready` or `job/seed cancelled`.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn saw(&self, event: &str) -> bool {
        self.events.lock().iter().any(|e| e == event)
    }

    fn record(&self, label: &str, event: &str) {
        self.events.lock().push(format!("{label} {event}"));
    }
}

#[async_trait]
impl ResourceTracker for ScriptedTracker {
    async fn track(
        &self,
        request: &TrackRequest,
        feedback: &dyn TrackFeedback,
    ) -> Result<(), TrackerError> {
        let label = request.label();
        let cancel = &request.options.cancel;
        let steps = self.scripts.lock().remove(&label).unwrap_or_default();

        for step in steps {
            match step {
                Step::Ready => {
                    if feedback.ready()? == TrackSignal::Stop {
                        self.record(&label, "ready");
                        return Ok(());
                    }
                }
                Step::ReadyIgnoringStop => {
                    let _ = feedback.ready();
                    self.record(&label, "ready");
                }
                Step::Fail(reason) => {
                    if feedback.failed(reason)? == TrackSignal::Stop {
                        return Ok(());
                    }
                    self.record(&label, "failure tolerated");
                }
                Step::FailSwallowingErrors(reason) => {
                    let _ = feedback.failed(reason);
                }
                Step::Status(status) => feedback.status(status),
                Step::Sleep(duration) => {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            self.record(&label, "cancelled");
                            return Ok(());
                        }
                        _ = tokio::time::sleep(duration) => {}
                    }
                }
                Step::Error(err) => return Err(err),
                Step::Return => return Ok(()),
                Step::Panic => panic!("scripted tracker panic for {label}"),
            }
        }

        cancel.cancelled().await;
        self.record(&label, "cancelled");
        Ok(())
    }
}

/// Renderer that keeps every snapshot it was handed.
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingRenderer {
    snapshots: Mutex<Vec<StatusSnapshot>>,
}

#[allow(dead_code)]
impl RecordingRenderer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn snapshots(&self) -> Vec<StatusSnapshot> {
        self.snapshots.lock().clone()
    }

    pub fn final_renders(&self) -> usize {
        self.snapshots.lock().iter().filter(|s| s.final_render).count()
    }

    pub fn periodic_renders(&self) -> usize {
        self.snapshots.lock().iter().filter(|s| !s.final_render).count()
    }
}

impl StatusRenderer for RecordingRenderer {
    fn render(&self, snapshot: &StatusSnapshot) -> Result<(), RenderError> {
        self.snapshots.lock().push(snapshot.clone());
        Ok(())
    }
}

/// Renderer whose every render fails.
#[allow(dead_code)]
pub struct BrokenRenderer;

impl StatusRenderer for BrokenRenderer {
    fn render(&self, _snapshot: &StatusSnapshot) -> Result<(), RenderError> {
        Err(RenderError::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "stdout closed",
        )))
    }
}
