// ABOUTME: Tracker feedback bound to one registry entry.
// ABOUTME: Each callback takes the registry lock for the duration of its transition.

use super::registry::{ResourceKey, SharedRegistry};
use super::status::ResourceStatus;
use super::tracker::{TrackFeedback, TrackSignal, TrackerError};

pub(crate) struct RegistryFeedback {
    registry: SharedRegistry,
    key: ResourceKey,
}

impl RegistryFeedback {
    pub(crate) fn new(registry: SharedRegistry, key: ResourceKey) -> Self {
        Self { registry, key }
    }
}

impl TrackFeedback for RegistryFeedback {
    fn ready(&self) -> Result<TrackSignal, TrackerError> {
        self.registry.lock().record_ready(&self.key)
    }

    fn failed(&self, reason: &str) -> Result<TrackSignal, TrackerError> {
        self.registry.lock().record_failure(&self.key, reason)
    }

    fn status(&self, status: ResourceStatus) {
        self.registry.lock().record_status(&self.key, status);
    }
}
