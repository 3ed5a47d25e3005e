// ABOUTME: Thin async wrapper around the kubectl binary.
// ABOUTME: Fetches objects as JSON and container logs with timestamps.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use snafu::ResultExt;
use std::process::Stdio;
use tokio::process::Command;

use super::error::{CommandSnafu, DecodeSnafu, KubectlError, NotFoundSnafu, SpawnSnafu};
use crate::types::Namespace;

/// Environment variable naming the kubectl binary to run.
pub const KUBECTL_ENV: &str = "ROLLTRACK_KUBECTL";

/// Runs kubectl commands against the current kubeconfig context.
#[derive(Debug, Clone)]
pub struct Kubectl {
    program: String,
    context: Option<String>,
}

impl Default for Kubectl {
    fn default() -> Self {
        Self::new()
    }
}

impl Kubectl {
    /// Use `$ROLLTRACK_KUBECTL`, or `kubectl` from `PATH`.
    pub fn new() -> Self {
        let program = std::env::var(KUBECTL_ENV).unwrap_or_else(|_| "kubectl".to_string());
        Self::with_program(program)
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            context: None,
        }
    }

    /// Use a kubeconfig context other than the current one.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// `kubectl get <resource> <name> -o json`.
    pub async fn get(
        &self,
        namespace: &Namespace,
        resource: &str,
        name: &str,
    ) -> Result<Value, KubectlError> {
        let label = format!("{resource}/{name}");
        let stdout = self
            .run(&label, &["get", resource, name, "-o", "json"], namespace)
            .await?;
        serde_json::from_slice(&stdout).context(DecodeSnafu { resource: label })
    }

    /// Pods matching a label selector.
    pub async fn pods(
        &self,
        namespace: &Namespace,
        selector: &str,
    ) -> Result<Vec<Value>, KubectlError> {
        let label = format!("pods -l {selector}");
        let stdout = self
            .run(&label, &["get", "pods", "-l", selector, "-o", "json"], namespace)
            .await?;
        let mut list: Value =
            serde_json::from_slice(&stdout).context(DecodeSnafu { resource: label })?;

        Ok(match list.get_mut("items").map(Value::take) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        })
    }

    /// Timestamped log lines of one container emitted at or after `since`.
    pub async fn logs(
        &self,
        namespace: &Namespace,
        pod: &str,
        container: &str,
        since: DateTime<Utc>,
    ) -> Result<String, KubectlError> {
        let since = format!(
            "--since-time={}",
            since.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        let label = format!("pod/{pod}");
        let stdout = self
            .run(
                &label,
                &["logs", pod, "-c", container, "--timestamps", &since],
                namespace,
            )
            .await?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    async fn run(
        &self,
        resource: &str,
        args: &[&str],
        namespace: &Namespace,
    ) -> Result<Vec<u8>, KubectlError> {
        let mut command = Command::new(&self.program);
        command.args(["--namespace", namespace.as_str()]);
        if let Some(context) = &self.context {
            command.args(["--context", context]);
        }
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::trace!(program = %self.program, ?args, "running kubectl");

        let output = command.output().await.context(SpawnSnafu {
            program: self.program.clone(),
        })?;

        if output.status.success() {
            return Ok(output.stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.contains("(NotFound)") {
            return NotFoundSnafu { resource }.fail();
        }
        CommandSnafu {
            args: args.join(" "),
            code: output.status.code(),
            stderr,
        }
        .fail()
    }
}
