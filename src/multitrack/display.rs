// ABOUTME: Consistent status snapshots handed to a status renderer.
// ABOUTME: Snapshots are taken and rendered while the registry lock is held.

use serde::Serialize;

use super::state::LifecycleStatus;
use super::status::ResourceStatus;
use crate::types::ResourceKind;

/// Status of one resource at snapshot time.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceSnapshot {
    pub kind: ResourceKind,
    pub name: String,
    pub namespace: String,
    pub lifecycle: LifecycleStatus,
    pub failures_count: u32,
    pub allow_failures_count: u32,
    /// Latest status reported by the tracker, if any yet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ResourceStatus>,
    /// Whether `status` differs from the one shown by the previous render.
    pub changed: bool,
}

/// Every tracked resource in registry order.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub resources: Vec<ResourceSnapshot>,
    /// The last render of the run.
    pub final_render: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to write status: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode status: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Formats status snapshots for the user.
pub trait StatusRenderer: Send + Sync {
    fn render(&self, snapshot: &StatusSnapshot) -> Result<(), RenderError>;
}

/// Renderer that discards every snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRenderer;

impl StatusRenderer for NoopRenderer {
    fn render(&self, _snapshot: &StatusSnapshot) -> Result<(), RenderError> {
        Ok(())
    }
}
