// ABOUTME: Runs one tracker task per resource and aggregates their outcomes.
// ABOUTME: Produces exactly one terminal outcome per run: success or a single error.

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::display::{NoopRenderer, RenderError, StatusRenderer};
use super::error::MultitrackError;
use super::feedback::RegistryFeedback;
use super::options::MultitrackOptions;
use super::registry::{Registry, ResourceKey, SharedRegistry};
use super::spec::{MultitrackSpecs, ResolvedSpec};
use super::termination::TerminationDecision;
use super::tracker::{TrackRequest, TrackerError, TrackerSet};
use crate::types::ResourceKind;

type Outcome = Result<(), MultitrackError>;

/// Tracks many resources concurrently and decides the overall verdict.
pub struct Multitracker {
    trackers: TrackerSet,
    renderer: Arc<dyn StatusRenderer>,
}

impl Multitracker {
    pub fn new(trackers: TrackerSet) -> Self {
        Self {
            trackers,
            renderer: Arc::new(NoopRenderer),
        }
    }

    /// Render status snapshots periodically and once at completion.
    pub fn with_renderer(mut self, renderer: Arc<dyn StatusRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Track every resource in `specs` until the run succeeds or fails.
    ///
    /// Returns immediately when `specs` is empty. Trackers still in flight when
    /// this returns are cancelled through the run scope, never awaited.
    pub async fn run(
        &self,
        specs: MultitrackSpecs,
        opts: MultitrackOptions,
    ) -> Result<(), MultitrackError> {
        if specs.is_empty() {
            return Ok(());
        }

        let resolved = specs.normalize();
        tracing::debug!(resources = resolved.len(), "starting multitrack");

        let scope = opts.parent.child_token();
        let _teardown = scope.clone().drop_guard();

        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
        let run = Arc::new(Run {
            registry: SharedRegistry::default(),
            renderer: self.renderer.clone(),
            outcome: outcome_tx,
        });

        self.start(&run, resolved, &opts, &scope);

        let mut ticker = opts.refresh_period().map(|period| {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            tokio::select! {
                biased;

                outcome = outcome_rx.recv() => {
                    return outcome.unwrap_or_else(|| {
                        Err(MultitrackError::Internal(
                            "run ended without an outcome".to_string(),
                        ))
                    });
                }
                _ = next_tick(&mut ticker) => run.display_status(),
            }
        }
    }

    /// Register every resource and spawn its tracker, then the joining task.
    fn start(
        &self,
        run: &Arc<Run>,
        resolved: Vec<(ResourceKind, ResolvedSpec)>,
        opts: &MultitrackOptions,
        scope: &CancellationToken,
    ) {
        let mut registry = run.registry.lock();
        let mut workers = Vec::with_capacity(resolved.len());

        for (kind, spec) in resolved {
            let cancel = scope.child_token();
            let options = opts.for_resource(
                cancel.clone(),
                spec.ignore_readiness_probe_fails_by_container.clone(),
            );
            let request = TrackRequest {
                kind,
                spec: spec.clone(),
                options,
            };
            let key = registry.insert(kind, spec, cancel);
            let tracker = self.trackers.get(kind);

            let worker_run = Arc::clone(run);
            let worker_key = key.clone();
            let handle = tokio::spawn(async move {
                let feedback =
                    RegistryFeedback::new(worker_run.registry.clone(), worker_key.clone());
                let result = tracker.track(&request, &feedback).await;
                worker_run.settle(&worker_key, result);
            });
            workers.push((key, handle));
        }

        registry.apply_termination_mode();
        drop(registry);

        let run = Arc::clone(run);
        tokio::spawn(async move { run.wait_for_trackers(workers).await });
    }
}

/// Track `specs` with `trackers` without status rendering.
pub async fn multitrack(
    trackers: TrackerSet,
    specs: MultitrackSpecs,
    opts: MultitrackOptions,
) -> Result<(), MultitrackError> {
    Multitracker::new(trackers).run(specs, opts).await
}

/// State shared by the tracker tasks, the joining task and the caller.
struct Run {
    registry: SharedRegistry,
    renderer: Arc<dyn StatusRenderer>,
    outcome: mpsc::UnboundedSender<Outcome>,
}

impl Run {
    fn render(&self, registry: &mut Registry, final_render: bool) -> Result<(), RenderError> {
        let snapshot = registry.snapshot(final_render);
        self.renderer.render(&snapshot)
    }

    /// Periodic status render.
    fn display_status(&self) {
        let mut registry = self.registry.lock();
        if registry.is_concluded() {
            return;
        }
        if let Err(err) = self.render(&mut registry, false) {
            self.conclude(&mut registry, Err(err.into()));
        }
    }

    /// Emit the run's outcome unless one was already emitted.
    fn conclude(&self, registry: &mut Registry, outcome: Outcome) {
        if registry.conclude() {
            let _ = self.outcome.send(outcome);
        }
    }

    /// Route a tracker's return value once it finished.
    fn settle(&self, key: &ResourceKey, result: Result<(), TrackerError>) {
        let mut registry = self.registry.lock();
        registry.release(key);

        if registry.is_concluded() {
            return;
        }

        if let Some(fault) = registry.take_fault(key) {
            self.conclude(
                &mut registry,
                Err(MultitrackError::Internal(format!("{key}: {fault}"))),
            );
            return;
        }

        match result {
            Ok(()) => {
                if let TerminationDecision::Terminated { cancelled } =
                    registry.apply_termination_mode()
                {
                    tracing::debug!(
                        cancelled = cancelled.len(),
                        "only non-blocking resources left, terminating"
                    );
                }
            }
            Err(TrackerError::FailWholeDeployProcess) => {
                let err = self.abort(&mut registry, key);
                self.conclude(&mut registry, Err(err));
            }
            Err(TrackerError::Internal(message)) => {
                self.conclude(&mut registry, Err(MultitrackError::Internal(message)));
            }
            Err(source) => {
                self.conclude(
                    &mut registry,
                    Err(MultitrackError::TrackerFailed {
                        kind: key.kind,
                        name: key.name.clone(),
                        source,
                    }),
                );
            }
        }
    }

    /// Final render and consolidated error after a resource-fatal failure.
    fn abort(&self, registry: &mut Registry, key: &ResourceKey) -> MultitrackError {
        if let Err(err) = self.render(registry, true) {
            return err.into();
        }
        registry.display_failed_service_messages();

        let failed = registry.failed_resources();
        if failed.is_empty() {
            return MultitrackError::TrackerFailed {
                kind: key.kind,
                name: key.name.clone(),
                source: TrackerError::FailWholeDeployProcess,
            };
        }
        MultitrackError::ResourcesFailed(failed)
    }

    /// Join every tracker task, then decide success or failure.
    async fn wait_for_trackers(&self, workers: Vec<(ResourceKey, JoinHandle<()>)>) {
        let (keys, handles): (Vec<_>, Vec<_>) = workers.into_iter().unzip();
        let joined = join_all(handles).await;

        let mut registry = self.registry.lock();
        for (key, result) in keys.iter().zip(joined) {
            if let Err(err) = result {
                registry.release(key);
                self.conclude(
                    &mut registry,
                    Err(MultitrackError::Internal(format!(
                        "tracker task for {key} did not complete: {err}"
                    ))),
                );
            }
        }

        if registry.is_concluded() {
            return;
        }

        if let Err(err) = self.render(&mut registry, true) {
            self.conclude(&mut registry, Err(err.into()));
            return;
        }

        if registry.has_failed_resources() {
            registry.display_failed_service_messages();
            let err = registry.failure_error();
            self.conclude(&mut registry, Err(err));
        } else {
            tracing::debug!("all trackers finished");
            self.conclude(&mut registry, Ok(()));
        }
    }
}

/// Next status tick; never resolves when periodic refresh is disabled.
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
