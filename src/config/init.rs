// ABOUTME: Manifest scaffolding for new projects.
// ABOUTME: Creates rolltrack.yml template files.

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::ResourceName;

use super::CONFIG_FILENAME;

/// Write a starter manifest tracking the deployment `name`.
pub fn init_manifest(dir: &Path, name: Option<&str>, force: bool) -> Result<()> {
    let path = dir.join(CONFIG_FILENAME);

    if path.exists() && !force {
        return Err(Error::AlreadyExists(path));
    }

    let name = match name {
        Some(n) => ResourceName::new(n).map_err(|e| Error::InvalidConfig(e.to_string()))?,
        None => ResourceName::new("my-app").map_err(|e| Error::InvalidConfig(e.to_string()))?,
    };

    std::fs::write(&path, template_yaml(&name))?;
    Ok(())
}

fn template_yaml(name: &ResourceName) -> String {
    format!(
        r#"namespace: default
timeout: 5m
status_progress_period: 5s
deployments:
  - name: {name}
    # WaitUntilResourceReady or NonBlocking
    termination: WaitUntilResourceReady
    # FailWholeDeployProcessImmediately, HopeUntilEndOfDeployProcess
    # or IgnoreAndContinueDeployProcess
    fail_mode: FailWholeDeployProcessImmediately
    allow_failures_count: 1
"#
    )
}
