// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use rolltrack::output::OutputMode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rolltrack")]
#[command(about = "Track Kubernetes rollouts until every resource is ready or one fails")]
#[command(version)]
pub struct Cli {
    /// Namespace of tracked resources [default: default]
    #[arg(short, long, global = true)]
    pub namespace: Option<String>,

    /// Per-resource timeout in seconds [default: 300]
    #[arg(short, long, global = true, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Kubeconfig context to use [default: current context]
    #[arg(long, global = true)]
    pub context: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output mode
    #[arg(long, global = true, value_enum, default_value_t = OutputMode::Normal)]
    pub output: OutputMode,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a starter rolltrack.yml manifest
    Init {
        /// Deployment to track in the template
        #[arg(long)]
        name: Option<String>,

        /// Overwrite an existing manifest
        #[arg(long)]
        force: bool,
    },

    /// Follow a resource, reporting failures without giving up
    Follow {
        #[command(subcommand)]
        target: TargetArg,
    },

    /// Rollout tracking commands
    Rollout {
        #[command(subcommand)]
        command: RolloutCommand,
    },

    /// Track every resource of a manifest concurrently
    Multitrack {
        /// Manifest file (default: discover rolltrack.yml in the current directory)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum RolloutCommand {
    /// Block until the resource is ready; the first failure fails
    Track {
        #[command(subcommand)]
        target: TargetArg,
    },
}

#[derive(Subcommand)]
pub enum TargetArg {
    /// Track a job
    Job { name: String },
    /// Track a deployment
    Deployment { name: String },
    /// Track a pod
    Pod { name: String },
}
