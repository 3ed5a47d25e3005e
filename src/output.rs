// ABOUTME: Output formatting for CLI feedback and tracked resource status.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use serde::Serialize;
use std::io::{self, Write};
use std::time::Instant;

use crate::multitrack::{RenderError, StatusRenderer, StatusSnapshot};

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputMode {
    /// Human-friendly output with progress messages and status tables
    #[default]
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => {
                println!("{message}");
            }
            OutputMode::Json => {
                if let Ok(json) = serde_json::to_string(&self.event("success", message)) {
                    println!("{json}");
                }
            }
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => {
                if let Ok(json) = serde_json::to_string(&self.event("error", message)) {
                    eprintln!("{json}");
                }
            }
        }
    }

    fn event<'a>(&self, event: &'a str, message: &'a str) -> JsonEvent<'a> {
        JsonEvent {
            event,
            message,
            duration_secs: self.start_time.map(|_| self.elapsed_secs()),
        }
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

/// Writes status snapshots to stdout according to the output mode.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleRenderer {
    mode: OutputMode,
}

impl ConsoleRenderer {
    pub fn new(mode: OutputMode) -> Self {
        Self { mode }
    }
}

impl StatusRenderer for ConsoleRenderer {
    fn render(&self, snapshot: &StatusSnapshot) -> Result<(), RenderError> {
        let text = match self.mode {
            OutputMode::Normal => format_snapshot(snapshot),
            OutputMode::Quiet if snapshot.final_render => format_snapshot(snapshot),
            OutputMode::Quiet => return Ok(()),
            OutputMode::Json => {
                let mut line = serde_json::to_string(&StatusEvent {
                    event: "status",
                    snapshot,
                })?;
                line.push('\n');
                line
            }
        };

        let mut stdout = io::stdout().lock();
        stdout.write_all(text.as_bytes())?;
        stdout.flush()?;
        Ok(())
    }
}

#[derive(Serialize)]
struct StatusEvent<'a> {
    event: &'a str,
    #[serde(flatten)]
    snapshot: &'a StatusSnapshot,
}

const HEADERS: [&str; 5] = ["RESOURCE", "NAMESPACE", "STATE", "FAILURES", "STATUS"];

/// Format a snapshot as an aligned table, one row per resource.
///
/// Rows whose status changed since the previous render are marked with `*`.
pub fn format_snapshot(snapshot: &StatusSnapshot) -> String {
    let rows: Vec<[String; 5]> = snapshot
        .resources
        .iter()
        .map(|r| {
            let marker = if r.changed { "*" } else { " " };
            [
                format!("{marker} {}/{}", r.kind, r.name),
                r.namespace.clone(),
                r.lifecycle.to_string(),
                format!("{}/{}", r.failures_count, r.allow_failures_count),
                r.status
                    .as_ref()
                    .map(|s| s.summary())
                    .unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    widths[0] += 2;
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    if snapshot.final_render {
        out.push_str("Final status\n");
    }
    push_row(&mut out, &widths, &HEADERS.map(|h| format!("  {h}")));
    for row in &rows {
        push_row(&mut out, &widths, row);
    }
    out
}

fn push_row(out: &mut String, widths: &[usize; 5], cells: &[String; 5]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ");
    out.push_str(line.trim_end());
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multitrack::{LifecycleStatus, ReplicaStatus, ResourceSnapshot, ResourceStatus};
    use crate::types::ResourceKind;

    fn snapshot(final_render: bool) -> StatusSnapshot {
        StatusSnapshot {
            resources: vec![
                ResourceSnapshot {
                    kind: ResourceKind::Deployment,
                    name: "web".to_string(),
                    namespace: "default".to_string(),
                    lifecycle: LifecycleStatus::Active,
                    failures_count: 0,
                    allow_failures_count: 1,
                    status: Some(ResourceStatus::Deployment(ReplicaStatus {
                        desired: 3,
                        updated: 3,
                        ready: 1,
                        available: 1,
                        ..Default::default()
                    })),
                    changed: true,
                },
                ResourceSnapshot {
                    kind: ResourceKind::Job,
                    name: "migrate".to_string(),
                    namespace: "default".to_string(),
                    lifecycle: LifecycleStatus::Succeeded,
                    failures_count: 0,
                    allow_failures_count: 1,
                    status: None,
                    changed: false,
                },
            ],
            final_render,
        }
    }

    #[test]
    fn table_has_header_and_one_row_per_resource() {
        let text = format_snapshot(&snapshot(false));
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("RESOURCE"));
        assert!(lines[1].starts_with("* deploy/web"));
        assert!(lines[1].contains("replicas 1/3"));
        assert!(lines[2].starts_with("  job/migrate"));
        assert!(lines[2].contains("succeeded"));
    }

    #[test]
    fn columns_are_aligned() {
        let text = format_snapshot(&snapshot(false));
        let columns: Vec<usize> = text
            .lines()
            .map(|line| line.find("default").unwrap_or_else(|| line.find("NAMESPACE").unwrap()))
            .collect();
        assert!(columns.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn final_render_is_labeled() {
        assert!(format_snapshot(&snapshot(true)).starts_with("Final status\n"));
        assert!(!format_snapshot(&snapshot(false)).starts_with("Final status"));
    }

    #[test]
    fn json_event_flattens_snapshot() {
        let snap = snapshot(true);
        let value = serde_json::to_value(StatusEvent {
            event: "status",
            snapshot: &snap,
        })
        .unwrap();

        assert_eq!(value["event"], "status");
        assert_eq!(value["final_render"], true);
        assert_eq!(value["resources"][0]["kind"], "deployment");
        assert_eq!(value["resources"][0]["status"]["kind"], "deployment");
        assert!(value["resources"][1].get("status").is_none());
    }
}
