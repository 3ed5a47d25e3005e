// ABOUTME: Application-wide error types for rolltrack.
// ABOUTME: Uses thiserror for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

use crate::kubectl::KubectlError;
use crate::multitrack::MultitrackError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("manifest not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Multitrack(#[from] MultitrackError),

    #[error("tracking interrupted")]
    Interrupted,

    #[error("{resource} failed: {reason}")]
    Tracking { resource: String, reason: String },

    #[error(transparent)]
    Kubectl(#[from] KubectlError),
}

pub type Result<T> = std::result::Result<T, Error>;
